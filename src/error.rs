use openssl::error::ErrorStack;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned while assembling or signing a certificate signing request.
///
/// Every variant is terminal: nothing is retried and no partial request is
/// returned next to an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The signing key is not an RSA key. Holds the concrete key type found.
    #[error("only RSA keys are currently supported but got: {0}")]
    UnsupportedKeyType(String),

    /// The certificate type is neither QWAC nor QSEAL.
    #[error("unknown QC type: {0}")]
    UnsupportedCertificateType(String),

    /// No competent authority is known for the country code.
    #[error("no competent authority for country code {country}: {source}")]
    UnknownCountryCode {
        country: String,
        #[source]
        source: QcStatementError,
    },

    /// The QC statement encoder rejected the role or authority data.
    #[error("failed to encode QC statements: {0}")]
    QcStatementEncodingFailed(#[source] QcStatementError),

    #[error("failed to sign certificate request: {0}")]
    SigningFailed(#[source] ErrorStack),

    #[error("failed to generate key pair: {0}")]
    KeyGenerationFailed(#[source] ErrorStack),

    /// A request option tried to add an extension that is already present.
    #[error("extension {0} is already present in the request")]
    DuplicateExtension(String),

    /// DNS names must be ASCII to fit an IA5String.
    #[error("invalid DNS name for subject alternative name: {0:?}")]
    InvalidDnsName(String),

    /// Internal DER conversion failed. Not expected for well formed keys.
    #[error("failed to encode {what}: {source}")]
    Encoding {
        what: &'static str,
        #[source]
        source: ErrorStack,
    },
}

/// Errors raised by the competent authority lookup and the QC statement codec.
#[derive(Debug, Error)]
pub enum QcStatementError {
    #[error("unknown country code: {0:?}")]
    UnknownCountryCode(String),

    #[error("at least one PSD2 role is required")]
    NoRoles,

    #[error("competent authority {0} must not be empty")]
    EmptyAuthorityField(&'static str),

    #[error("unknown PSD2 role: {0}")]
    UnknownRole(String),

    #[error("unknown QC type: {0}")]
    UnknownQcType(String),

    #[error("missing {0} statement")]
    MissingStatement(&'static str),

    #[error("ASN.1 parse error: {0}")]
    Asn1(#[from] yasna::ASN1Error),
}
