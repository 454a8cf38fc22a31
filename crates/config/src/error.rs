use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration source could not be read or did not deserialize.
    #[display("could not load configuration")]
    Load,
    /// The merged configuration is well-formed but unusable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}
