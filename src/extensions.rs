//! X.509v3 extensions carried in the request.
//!
//! What a certificate type may do is kept in a single policy table so the
//! key usage and extended key usage of a type can never disagree.
use openssl::asn1::{Asn1Object, Asn1OctetString};
use openssl::error::ErrorStack;
use openssl::hash::{MessageDigest, hash};
use openssl::pkey::HasPublic;
use openssl::rsa::RsaRef;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509Extension, X509v3Context};
use yasna::models::ObjectIdentifier;

use crate::error::{Error, Result};
use crate::qcstatements::CertificateType;

pub const OID_SUBJECT_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 14];
pub const OID_KEY_USAGE: &[u64] = &[2, 5, 29, 15];
pub const OID_SUBJECT_ALT_NAME: &[u64] = &[2, 5, 29, 17];
pub const OID_EXT_KEY_USAGE: &[u64] = &[2, 5, 29, 37];
pub const OID_QC_STATEMENTS: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 3];

/// id-kp-serverAuth
pub const OID_SERVER_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 1];
/// id-kp-clientAuth
pub const OID_CLIENT_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 2];

/// Key usage flags a qualified certificate can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    DigitalSignature,
    /// Called contentCommitment in recent editions of X.509.
    NonRepudiation,
}

impl KeyUsage {
    /// Position in the `KeyUsage` named bit list.
    fn bit(self) -> u32 {
        match self {
            KeyUsage::DigitalSignature => 0,
            KeyUsage::NonRepudiation => 1,
        }
    }
}

struct UsagePolicy {
    certificate_type: CertificateType,
    key_usage: &'static [KeyUsage],
    extended_key_usage: &'static [&'static [u64]],
}

const USAGE_POLICIES: &[UsagePolicy] = &[
    UsagePolicy {
        certificate_type: CertificateType::Qwac,
        key_usage: &[KeyUsage::DigitalSignature],
        extended_key_usage: &[OID_SERVER_AUTH, OID_CLIENT_AUTH],
    },
    UsagePolicy {
        certificate_type: CertificateType::Qseal,
        key_usage: &[KeyUsage::DigitalSignature, KeyUsage::NonRepudiation],
        extended_key_usage: &[],
    },
];

fn usage_policy(certificate_type: CertificateType) -> Result<&'static UsagePolicy> {
    USAGE_POLICIES
        .iter()
        .find(|policy| policy.certificate_type == certificate_type)
        .ok_or_else(|| Error::UnsupportedCertificateType(certificate_type.to_string()))
}

/// Key usage flags for a certificate type, in bit order.
pub fn key_usage_for_type(certificate_type: CertificateType) -> Result<&'static [KeyUsage]> {
    usage_policy(certificate_type).map(|policy| policy.key_usage)
}

/// Extended key usage purposes for a certificate type. Empty for QSEAL.
pub fn extended_key_usage_for_type(
    certificate_type: CertificateType,
) -> Result<&'static [&'static [u64]]> {
    usage_policy(certificate_type).map(|policy| policy.extended_key_usage)
}

/// A single extension: OID, criticality and the DER encoded `extnValue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    oid: Vec<u64>,
    critical: bool,
    value: Vec<u8>,
}

impl Extension {
    pub fn new(oid: &[u64], critical: bool, value: Vec<u8>) -> Self {
        Self {
            oid: oid.to_vec(),
            critical,
            value,
        }
    }

    pub fn oid(&self) -> &[u64] {
        &self.oid
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub(crate) fn to_x509_extension(&self) -> Result<X509Extension, ErrorStack> {
        let oid = Asn1Object::from_str(&oid_to_string(&self.oid))?;
        let contents = Asn1OctetString::new_from_bytes(&self.value)?;
        X509Extension::new_from_der(&oid, self.critical, &contents)
    }
}

/// Builds the key usage extension. Always critical.
///
/// The bit string is written in its canonical form: bit 0 is the most
/// significant bit of the first byte and trailing zero bits are dropped,
/// so `[DigitalSignature]` encodes as `03 02 07 80`.
pub fn key_usage_extension(usages: &[KeyUsage]) -> Extension {
    let mut bits: u16 = 0;
    for usage in usages {
        bits |= 1 << usage.bit();
    }

    // 1-based index of the highest flag
    let bit_len = 16 - bits.leading_zeros();
    let bytes = bits.reverse_bits().to_be_bytes();
    let byte_len = bit_len.div_ceil(8) as usize;

    let value = yasna::construct_der(|writer| {
        writer.write_bitvec_bytes(&bytes[..byte_len], bit_len as usize);
    });
    Extension::new(OID_KEY_USAGE, true, value)
}

/// Builds the extended key usage extension, non-critical.
///
/// Callers must leave the extension out entirely when `purposes` is empty.
pub fn extended_key_usage_extension(purposes: &[&[u64]]) -> Extension {
    let value = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for purpose in purposes {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(purpose));
            }
        });
    });
    Extension::new(OID_EXT_KEY_USAGE, false, value)
}

/// SHA-1 of the PKCS#1 `RSAPublicKey`, as an OCTET STRING.
pub fn subject_key_identifier<T: HasPublic>(public_key: &RsaRef<T>) -> Result<Extension> {
    let identifier = public_key
        .public_key_to_der_pkcs1()
        .and_then(|der| hash(MessageDigest::sha1(), &der))
        .map_err(|source| Error::Encoding {
            what: "subject key identifier",
            source,
        })?;

    let value = yasna::construct_der(|writer| writer.write_bytes(&identifier));
    Ok(Extension::new(OID_SUBJECT_KEY_IDENTIFIER, false, value))
}

/// Wraps an encoded QC statements payload, non-critical.
pub fn qc_statements_extension(statements: Vec<u8>) -> Extension {
    Extension::new(OID_QC_STATEMENTS, false, statements)
}

/// DNS subject alternative names, non-critical.
///
/// Names must be printable ASCII without commas, openssl reads the list as
/// a comma separated `DNS:` config value.
pub fn subject_alt_name_extension<S: AsRef<str>>(
    context: &X509v3Context<'_>,
    dns_names: &[S],
) -> Result<X509Extension> {
    let mut san = SubjectAlternativeName::new();
    for name in dns_names {
        let name = name.as_ref();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_graphic() && c != ',') {
            return Err(Error::InvalidDnsName(name.to_string()));
        }
        san.dns(name);
    }
    san.build(context).map_err(|source| Error::Encoding {
        what: "subject alternative name",
        source,
    })
}

/// Dotted decimal form of an OID, e.g. `2.5.29.15`.
pub fn oid_to_string(oid: &[u64]) -> String {
    oid.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;
    use openssl::x509::X509ReqBuilder;

    #[test]
    fn qwac_key_usage_is_digital_signature() {
        let usages = key_usage_for_type(CertificateType::Qwac).unwrap();
        assert_eq!(usages, &[KeyUsage::DigitalSignature]);
    }

    #[test]
    fn qseal_key_usage_adds_non_repudiation() {
        let usages = key_usage_for_type(CertificateType::Qseal).unwrap();
        assert_eq!(
            usages,
            &[KeyUsage::DigitalSignature, KeyUsage::NonRepudiation]
        );
    }

    #[test]
    fn extended_key_usage_per_type() {
        let qwac = extended_key_usage_for_type(CertificateType::Qwac).unwrap();
        assert_eq!(qwac, &[OID_SERVER_AUTH, OID_CLIENT_AUTH]);
        let qseal = extended_key_usage_for_type(CertificateType::Qseal).unwrap();
        assert!(qseal.is_empty());
    }

    #[test]
    fn key_usage_bits_are_trimmed() {
        let qwac = key_usage_extension(&[KeyUsage::DigitalSignature]);
        assert!(qwac.is_critical());
        assert_eq!(qwac.oid(), OID_KEY_USAGE);
        assert_eq!(qwac.value(), &[0x03, 0x02, 0x07, 0x80]);

        let qseal = key_usage_extension(&[KeyUsage::DigitalSignature, KeyUsage::NonRepudiation]);
        assert_eq!(qseal.value(), &[0x03, 0x02, 0x06, 0xc0]);

        let non_repudiation = key_usage_extension(&[KeyUsage::NonRepudiation]);
        assert_eq!(non_repudiation.value(), &[0x03, 0x02, 0x06, 0x40]);
    }

    #[test]
    fn extended_key_usage_lists_oids_in_order() {
        let ext = extended_key_usage_extension(&[OID_SERVER_AUTH, OID_CLIENT_AUTH]);
        assert!(!ext.is_critical());
        assert_eq!(
            ext.value(),
            &[
                0x30, 0x14, 0x06, 0x08, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x01, 0x06, 0x08,
                0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x02,
            ]
        );
    }

    #[test]
    fn subject_key_identifier_hashes_pkcs1_key() -> Result<(), Box<dyn std::error::Error>> {
        let rsa = Rsa::generate(2048)?;
        let ext = subject_key_identifier(&rsa)?;
        let digest = hash(MessageDigest::sha1(), &rsa.public_key_to_der_pkcs1()?)?;

        assert_eq!(ext.oid(), OID_SUBJECT_KEY_IDENTIFIER);
        assert!(!ext.is_critical());
        assert_eq!(&ext.value()[..2], &[0x04, 0x14]);
        assert_eq!(&ext.value()[2..], &digest[..]);
        Ok(())
    }

    #[test]
    fn subject_alt_name_rejects_names_openssl_would_misread()
    -> Result<(), Box<dyn std::error::Error>> {
        let builder = X509ReqBuilder::new()?;
        let context = builder.x509v3_context(None);

        assert!(subject_alt_name_extension(&context, &["a.io", "b.io"]).is_ok());
        for name in ["bücher.example", "a.io,IP:10.0.0.1", "a io", ""] {
            assert!(
                matches!(
                    subject_alt_name_extension(&context, &[name]),
                    Err(Error::InvalidDnsName(found)) if found == name
                ),
                "{name:?} should be rejected"
            );
        }
        Ok(())
    }

    #[test]
    fn formats_dotted_oid() {
        assert_eq!(oid_to_string(OID_QC_STATEMENTS), "1.3.6.1.5.5.7.1.3");
    }
}
