//! # eidas-csr
//!
//! ## Description
//!
//! Builds PKCS#10 certificate signing requests for eIDAS qualified certificates
//! as used by Open Banking (PSD2):
//! - QWAC, Qualified Website Authentication Certificate, for TLS client and server authentication
//! - QSEAL, Qualified Electronic Seal certificate, for signing
//!
//! Generic tooling produces requests that most qualified trust service providers
//! reject. This crate takes care of the parts that matter to them:
//! - The subject is written in a fixed order: `C`, `O`, `organizationIdentifier`, `CN`
//! - Key usage and extended key usage follow the certificate type
//! - A subject key identifier is included
//! - The `qcStatements` extension carries the PSD2 roles and the competent authority
//!   of the country (ETSI TS 119 495)
//!
//! Only RSA keys are supported. Signing always uses SHA-256 with RSA.
//!
//! ## Basic Example creating a QWAC signing request and private key
//! ```rust
//! use eidas_csr::{CertificateType, CsrBuilder, Role};
//!
//! let csr = CsrBuilder::new()
//!     .country_code("GB")
//!     .organization("Foo Org")
//!     .organization_id("PSDGB-FCA-123456")
//!     .common_name("0015800001041REAAY")
//!     .role(Role::AccountInformation)
//!     .certificate_type(CertificateType::Qwac)
//!     .dns_name("api.example.com")
//!     .generate();
//! assert!(csr.is_ok());
//!
//! // DER is in csr.der, PEM is available through csr_pem() and private_key_pem()
//! ```
//!
//! ## Basic Example creating a QSEAL signing request with an existing key
//! ```rust
//! use eidas_csr::{CertificateType, CsrBuilder, Role};
//! use openssl::pkey::PKey;
//! use openssl::rsa::Rsa;
//!
//! let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
//! let der = CsrBuilder::new()
//!     .country_code("DE")
//!     .organization("Bar Bank")
//!     .organization_id("PSDDE-BAFIN-654321")
//!     .common_name("Bar Bank Seal")
//!     .roles(vec![Role::AccountServicing, Role::PaymentInitiation])
//!     .certificate_type(CertificateType::Qseal)
//!     .build_with_key(&key);
//! assert!(der.is_ok());
//! ```
//!
//! ## Example on how to use a different competent authority register
//! ```rust
//! use eidas_csr::qcstatements::{CompetentAuthority, CompetentAuthorityLookup};
//! use eidas_csr::{CsrBuilder, QcStatementError, Role};
//!
//! struct Sandbox;
//!
//! impl CompetentAuthorityLookup for Sandbox {
//!     fn lookup(&self, _country_code: &str) -> Result<CompetentAuthority, QcStatementError> {
//!         Ok(CompetentAuthority::new("Sandbox Authority", "XX-SBX"))
//!     }
//! }
//!
//! let csr = CsrBuilder::new()
//!     .country_code("XX")
//!     .organization("Test Org")
//!     .organization_id("PSDXX-SBX-1")
//!     .common_name("Test")
//!     .role(Role::PaymentInitiation)
//!     .authority_lookup(Sandbox)
//!     .generate();
//! assert!(csr.is_ok());
//! ```
//!
//! ## Config
//!
//! Values that can be set when building a request
//! | keyword | description | options |
//! | ----------------- | --------------------------------------------------------------------------- | ----------------------------------- |
//! | country_code | ISO 3166-1 alpha-2 code, also selects the competent authority | string: GB |
//! | organization | organisation name | string: Foo Org |
//! | organization_id | organisation identifier, for PSD2 `PSD<country>-<authority>-<id>` | string: PSDGB-FCA-123456 |
//! | common_name | common name | string: Foo Name |
//! | roles | PSD2 roles granted to the organisation | list of enums, defined in Roles table |
//! | certificate_type | which qualified certificate to request, defaults to QWAC | enum: Qwac, Qseal |
//! | dns_name | DNS subject alternative name, may be repeated | string: api.example.com |
//!
//! Generated keys are always RSA 2048.
//!
//! ### Roles
//!
//! | keyword | name | description |
//! | ------------------------------------ | ------ | ---------------------------------------------- |
//! | AccountServicing | PSP_AS | account servicing payment service provider |
//! | PaymentInitiation | PSP_PI | payment initiation service provider |
//! | AccountInformation | PSP_AI | account information service provider |
//! | IssuingOfCardBasedPaymentInstruments | PSP_IC | issuer of card-based payment instruments |
//!
//! ### Extensions per certificate type
//!
//! | extension | QWAC | QSEAL |
//! | ------------------------ | --------------------------- | ------------------------------------ |
//! | keyUsage (critical) | digitalSignature | digitalSignature, nonRepudiation |
//! | extKeyUsage | serverAuth, clientAuth | not present |
//! | subjectKeyIdentifier | SHA-1 of the PKCS#1 key | SHA-1 of the PKCS#1 key |
//! | qcStatements | QcCompliance, QcType web, PSD2 | QcCompliance, QcType eseal, PSD2 |

pub mod error;
pub mod extensions;
pub mod qcstatements;
pub mod request;
pub mod subject;

pub use error::{Error, QcStatementError, Result};
pub use qcstatements::{CertificateType, Role};
pub use request::{
    CertificateOption, CsrBuilder, GeneratedCsr, RequestAssembler, RequestParameters,
    build_request, generate_request, with_dns_name, with_extension,
};
