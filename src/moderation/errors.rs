use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("user {0} already has a pending ban event")]
    DuplicateRegistration(String),
}

#[derive(Error, Debug)]
pub enum CancelError {
    #[error("no open ban event for user {0} found")]
    NotRegistered(String),
    #[error("unable to cancel the ban on {0}: timer not started")]
    NotArmed(String),
    #[error("unable to cancel the ban on {0}: timer already canceled")]
    AlreadyCanceled(String),
}
