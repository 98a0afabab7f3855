use cadre_types::lifecycle::IllegalTransition;

/// Why a staking request was turned away.
///
/// Rejections never change state. Each carries a stable code, reported to callers as the
/// `check_tx` or `deliver_tx` code of the transaction.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeError {
    /// An identical envelope was already submitted.
    #[error("duplicate transaction")]
    Duplicate,
    /// No candidate is registered for the address.
    #[error("candidate does not exist for that address")]
    BadValidatorAddr,
    #[error("address has been declared")]
    AddressAlreadyDeclared,
    #[error("pubkey has been declared")]
    PubKeyAlreadyDeclared,
    /// Only the foundation account may verify candidates.
    #[error("verification disallowed")]
    VerificationDisallowed,
    #[error("candidate has been activated")]
    AlreadyActivated,
    #[error("candidate has been deactivated")]
    AlreadyDeactivated,
    /// An account update request that is invalid for any reason.
    #[error("bad request")]
    BadRequest,
    #[error("insufficient funds")]
    InsufficientFunds,
}

impl StakeError {
    pub fn code(&self) -> u32 {
        match self {
            StakeError::Duplicate => 3,
            StakeError::BadValidatorAddr => 10,
            StakeError::AddressAlreadyDeclared => 11,
            StakeError::PubKeyAlreadyDeclared => 12,
            StakeError::VerificationDisallowed => 13,
            StakeError::AlreadyActivated => 14,
            StakeError::AlreadyDeactivated => 15,
            StakeError::BadRequest => 16,
            StakeError::InsufficientFunds => 17,
        }
    }
}

impl From<IllegalTransition> for StakeError {
    fn from(illegal: IllegalTransition) -> Self {
        match illegal {
            IllegalTransition::NotDeclared => StakeError::BadValidatorAddr,
            IllegalTransition::AlreadyDeclared => StakeError::AddressAlreadyDeclared,
            IllegalTransition::AlreadyActivated => StakeError::AlreadyActivated,
            IllegalTransition::AlreadyDeactivated => StakeError::AlreadyDeactivated,
        }
    }
}
