//! Qualified certificate statements for PSD2 (ETSI TS 119 495).
//!
//! The request assembler only talks to this module through the
//! [`CompetentAuthorityLookup`] and [`QcStatementCodec`] traits, so callers
//! can plug in their own authority register or encoder. The defaults are
//! [`NationalCompetentAuthorities`] and [`Psd2QcStatements`].
//!
//! ```text
//! QCStatements ::= SEQUENCE OF QCStatement
//! QCStatement  ::= SEQUENCE { statementId OBJECT IDENTIFIER, statementInfo ANY OPTIONAL }
//!
//! PSD2QcType   ::= SEQUENCE { rolesOfPSP RolesOfPSP, nCAName NCAName, nCAId NCAId }
//! RolesOfPSP   ::= SEQUENCE OF RoleOfPSP
//! RoleOfPSP    ::= SEQUENCE { roleOfPspOid OBJECT IDENTIFIER, roleOfPspName UTF8String }
//! ```
use std::fmt;
use std::str::FromStr;

use yasna::models::ObjectIdentifier;

use crate::error::{Error, QcStatementError};
use crate::extensions::oid_to_string;

const OID_QCS_QC_COMPLIANCE: &[u64] = &[0, 4, 0, 1862, 1, 1];
const OID_QCS_QC_TYPE: &[u64] = &[0, 4, 0, 1862, 1, 6];
const OID_QCT_ESEAL: &[u64] = &[0, 4, 0, 1862, 1, 6, 2];
const OID_QCT_WEB: &[u64] = &[0, 4, 0, 1862, 1, 6, 3];
const OID_PSD2_QC_STATEMENT: &[u64] = &[0, 4, 0, 19495, 2];

/// The kind of qualified certificate being requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CertificateType {
    /// Qualified Website Authentication Certificate, used for TLS.
    #[default]
    Qwac,
    /// Qualified Electronic Seal certificate, used for signing.
    Qseal,
}

impl CertificateType {
    /// ETSI `QcType` OID carried in the QC statements.
    pub const fn qc_type_oid(self) -> &'static [u64] {
        match self {
            CertificateType::Qwac => OID_QCT_WEB,
            CertificateType::Qseal => OID_QCT_ESEAL,
        }
    }

    /// Maps an ETSI `QcType` OID back to a certificate type.
    pub fn from_qc_type_oid(oid: &[u64]) -> Result<Self, Error> {
        if oid == OID_QCT_WEB {
            Ok(CertificateType::Qwac)
        } else if oid == OID_QCT_ESEAL {
            Ok(CertificateType::Qseal)
        } else {
            Err(Error::UnsupportedCertificateType(oid_to_string(oid)))
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateType::Qwac => f.write_str("QWAC"),
            CertificateType::Qseal => f.write_str("QSEAL"),
        }
    }
}

impl FromStr for CertificateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("qwac") {
            Ok(CertificateType::Qwac)
        } else if s.eq_ignore_ascii_case("qseal") {
            Ok(CertificateType::Qseal)
        } else {
            Err(Error::UnsupportedCertificateType(s.to_string()))
        }
    }
}

/// Role of a payment service provider granted by its competent authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// `PSP_AS`, account servicing.
    AccountServicing,
    /// `PSP_PI`, payment initiation.
    PaymentInitiation,
    /// `PSP_AI`, account information.
    AccountInformation,
    /// `PSP_IC`, issuing of card-based payment instruments.
    IssuingOfCardBasedPaymentInstruments,
}

type RoleEntry = (Role, &'static [u64], &'static str);

const PSP_AS: RoleEntry = (Role::AccountServicing, &[0, 4, 0, 19495, 1, 1], "PSP_AS");
const PSP_PI: RoleEntry = (Role::PaymentInitiation, &[0, 4, 0, 19495, 1, 2], "PSP_PI");
const PSP_AI: RoleEntry = (Role::AccountInformation, &[0, 4, 0, 19495, 1, 3], "PSP_AI");
const PSP_IC: RoleEntry = (
    Role::IssuingOfCardBasedPaymentInstruments,
    &[0, 4, 0, 19495, 1, 4],
    "PSP_IC",
);

const ROLES: [RoleEntry; 4] = [PSP_AS, PSP_PI, PSP_AI, PSP_IC];

impl Role {
    pub fn oid(self) -> &'static [u64] {
        self.entry().1
    }

    /// Short name written next to the OID, e.g. `PSP_AI`.
    pub fn name(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static RoleEntry {
        match self {
            Role::AccountServicing => &PSP_AS,
            Role::PaymentInitiation => &PSP_PI,
            Role::AccountInformation => &PSP_AI,
            Role::IssuingOfCardBasedPaymentInstruments => &PSP_IC,
        }
    }

    fn from_oid(oid: &[u64]) -> Option<Self> {
        ROLES
            .iter()
            .find(|(_, role_oid, _)| *role_oid == oid)
            .map(|(role, _, _)| *role)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = QcStatementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ROLES
            .iter()
            .find(|(_, _, name)| name.eq_ignore_ascii_case(s))
            .map(|(role, _, _)| *role)
            .ok_or_else(|| QcStatementError::UnknownRole(s.to_string()))
    }
}

/// National regulator that authorised the payment service provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetentAuthority {
    pub name: String,
    /// Identifier such as `GB-FCA`.
    pub id: String,
}

impl CompetentAuthority {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Resolves the competent authority for a country code.
pub trait CompetentAuthorityLookup: Send + Sync {
    fn lookup(&self, country_code: &str) -> Result<CompetentAuthority, QcStatementError>;
}

/// Built-in register of EEA national competent authorities plus the UK.
#[derive(Debug, Clone, Copy, Default)]
pub struct NationalCompetentAuthorities;

static NATIONAL_COMPETENT_AUTHORITIES: &[(&str, &str, &str)] = &[
    ("AT", "Austria Financial Market Authority", "AT-FMA"),
    ("BE", "National Bank of Belgium", "BE-NBB"),
    ("BG", "Bulgarian National Bank", "BG-BNB"),
    ("CY", "Central Bank of Cyprus", "CY-CBC"),
    ("CZ", "Czech National Bank", "CZ-CNB"),
    ("DE", "Federal Financial Supervisory Authority", "DE-BAFIN"),
    ("DK", "Danish Financial Supervisory Authority", "DK-DFSA"),
    ("EE", "Estonia Financial Supervisory Authority", "EE-FI"),
    ("ES", "Bank of Spain", "ES-BE"),
    ("FI", "Finnish Financial Supervisory Authority", "FI-FINFSA"),
    (
        "FR",
        "Prudential Supervisory and Resolution Authority",
        "FR-ACPR",
    ),
    ("GB", "Financial Conduct Authority", "GB-FCA"),
    ("GR", "Bank of Greece", "GR-BOG"),
    ("HR", "Croatian National Bank", "HR-CNB"),
    ("HU", "Central Bank of Hungary", "HU-CBH"),
    ("IE", "Central Bank of Ireland", "IE-CBI"),
    ("IS", "Financial Supervisory Authority", "IS-FME"),
    ("IT", "Bank of Italy", "IT-BI"),
    ("LI", "Financial Market Authority Liechtenstein", "LI-FMA"),
    ("LT", "Bank of Lithuania", "LT-BOL"),
    (
        "LU",
        "Commission for the Supervision of Financial Sector",
        "LU-CSSF",
    ),
    ("LV", "Financial and Capital Markets Commission", "LV-FCMC"),
    ("MT", "Malta Financial Services Authority", "MT-MFSA"),
    ("NL", "The Netherlands Bank", "NL-DNB"),
    ("NO", "The Financial Supervisory Authority of Norway", "NO-FSA"),
    ("PL", "Polish Financial Supervision Authority", "PL-PFSA"),
    ("PT", "Bank of Portugal", "PT-BP"),
    ("RO", "National Bank of Romania", "RO-NBR"),
    ("SE", "Swedish Financial Supervision Authority", "SE-FINA"),
    ("SI", "Bank of Slovenia", "SI-BS"),
    ("SK", "National Bank of Slovakia", "SK-NBS"),
];

impl CompetentAuthorityLookup for NationalCompetentAuthorities {
    fn lookup(&self, country_code: &str) -> Result<CompetentAuthority, QcStatementError> {
        NATIONAL_COMPETENT_AUTHORITIES
            .iter()
            .find(|(country, _, _)| country.eq_ignore_ascii_case(country_code))
            .map(|(_, name, id)| CompetentAuthority::new(*name, *id))
            .ok_or_else(|| QcStatementError::UnknownCountryCode(country_code.to_string()))
    }
}

/// What a QC statements payload says about the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcStatementContents {
    pub roles: Vec<Role>,
    pub authority: CompetentAuthority,
    pub certificate_type: CertificateType,
}

/// Encodes and decodes the value of the qcStatements extension.
pub trait QcStatementCodec: Send + Sync {
    fn encode(
        &self,
        roles: &[Role],
        authority: &CompetentAuthority,
        certificate_type: CertificateType,
    ) -> Result<Vec<u8>, QcStatementError>;

    fn decode(&self, der: &[u8]) -> Result<QcStatementContents, QcStatementError>;
}

/// ETSI TS 119 495 encoding: QcCompliance, QcType and the PSD2 statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct Psd2QcStatements;

impl QcStatementCodec for Psd2QcStatements {
    fn encode(
        &self,
        roles: &[Role],
        authority: &CompetentAuthority,
        certificate_type: CertificateType,
    ) -> Result<Vec<u8>, QcStatementError> {
        if roles.is_empty() {
            return Err(QcStatementError::NoRoles);
        }
        if authority.name.is_empty() {
            return Err(QcStatementError::EmptyAuthorityField("name"));
        }
        if authority.id.is_empty() {
            return Err(QcStatementError::EmptyAuthorityField("id"));
        }

        Ok(yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_QCS_QC_COMPLIANCE));
                });

                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_QCS_QC_TYPE));
                    writer.next().write_sequence(|writer| {
                        writer.next().write_oid(&ObjectIdentifier::from_slice(
                            certificate_type.qc_type_oid(),
                        ));
                    });
                });

                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_PSD2_QC_STATEMENT));
                    writer.next().write_sequence(|writer| {
                        writer.next().write_sequence(|writer| {
                            for role in roles {
                                writer.next().write_sequence(|writer| {
                                    writer
                                        .next()
                                        .write_oid(&ObjectIdentifier::from_slice(role.oid()));
                                    writer.next().write_utf8_string(role.name());
                                });
                            }
                        });
                        writer.next().write_utf8_string(&authority.name);
                        writer.next().write_utf8_string(&authority.id);
                    });
                });
            });
        }))
    }

    fn decode(&self, der: &[u8]) -> Result<QcStatementContents, QcStatementError> {
        let mut statements: Vec<(ObjectIdentifier, Option<Vec<u8>>)> = Vec::new();
        yasna::parse_der(der, |reader| {
            reader.read_sequence_of(|reader| {
                let statement = reader.read_sequence(|reader| {
                    let id = reader.next().read_oid()?;
                    let info = reader.read_optional(|reader| reader.read_der())?;
                    Ok((id, info))
                })?;
                statements.push(statement);
                Ok(())
            })
        })?;

        let statement_info = |oid: &[u64], name: &'static str| {
            statements
                .iter()
                .find(|(id, _)| id.components().as_slice() == oid)
                .and_then(|(_, info)| info.as_deref())
                .ok_or(QcStatementError::MissingStatement(name))
        };

        let qc_types = yasna::parse_der(statement_info(OID_QCS_QC_TYPE, "QcType")?, |reader| {
            let mut qc_types = Vec::new();
            reader.read_sequence_of(|reader| {
                qc_types.push(reader.read_oid()?);
                Ok(())
            })?;
            Ok(qc_types)
        })?;
        let certificate_type = qc_types
            .iter()
            .find_map(|oid| CertificateType::from_qc_type_oid(oid.components()).ok())
            .ok_or_else(|| {
                let listed: Vec<_> = qc_types
                    .iter()
                    .map(|oid| oid_to_string(oid.components()))
                    .collect();
                QcStatementError::UnknownQcType(listed.join(", "))
            })?;

        let (role_oids, name, id) = yasna::parse_der(
            statement_info(OID_PSD2_QC_STATEMENT, "PSD2")?,
            |reader| {
                reader.read_sequence(|reader| {
                    let mut role_oids = Vec::new();
                    reader.next().read_sequence_of(|reader| {
                        let oid = reader.read_sequence(|reader| {
                            let oid = reader.next().read_oid()?;
                            let _name = reader.next().read_utf8string()?;
                            Ok(oid)
                        })?;
                        role_oids.push(oid);
                        Ok(())
                    })?;
                    let name = reader.next().read_utf8string()?;
                    let id = reader.next().read_utf8string()?;
                    Ok((role_oids, name, id))
                })
            },
        )?;
        if role_oids.is_empty() {
            return Err(QcStatementError::NoRoles);
        }
        let roles = role_oids
            .iter()
            .map(|oid| {
                Role::from_oid(oid.components())
                    .ok_or_else(|| QcStatementError::UnknownRole(oid_to_string(oid.components())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QcStatementContents {
            roles,
            authority: CompetentAuthority { name, id },
            certificate_type,
        })
    }
}

/// Decodes a qcStatements extension value with the default codec.
pub fn extract(der: &[u8]) -> Result<QcStatementContents, QcStatementError> {
    Psd2QcStatements.decode(der)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID_QCT_ESIGN: &[u64] = &[0, 4, 0, 1862, 1, 6, 1];

    fn fca() -> CompetentAuthority {
        CompetentAuthority::new("Financial Conduct Authority", "GB-FCA")
    }

    /// Statements whose QcType lists `qc_types`, with a single PSP_AI role.
    fn statements_with_qc_types(qc_types: &[&[u64]]) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_QCS_QC_TYPE));
                    writer.next().write_sequence(|writer| {
                        for qc_type in qc_types {
                            writer
                                .next()
                                .write_oid(&ObjectIdentifier::from_slice(qc_type));
                        }
                    });
                });
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_PSD2_QC_STATEMENT));
                    writer.next().write_sequence(|writer| {
                        writer.next().write_sequence(|writer| {
                            writer.next().write_sequence(|writer| {
                                let role = Role::AccountInformation;
                                writer
                                    .next()
                                    .write_oid(&ObjectIdentifier::from_slice(role.oid()));
                                writer.next().write_utf8_string("PSP_AI");
                            });
                        });
                        writer.next().write_utf8_string("Financial Conduct Authority");
                        writer.next().write_utf8_string("GB-FCA");
                    });
                });
            });
        })
    }

    #[test]
    fn looks_up_uk_authority() {
        let authority = NationalCompetentAuthorities.lookup("GB").unwrap();
        assert_eq!(authority, fca());
        let authority = NationalCompetentAuthorities.lookup("de").unwrap();
        assert_eq!(authority.id, "DE-BAFIN");
    }

    #[test]
    fn unknown_country_is_rejected() {
        let err = NationalCompetentAuthorities.lookup("ZZ").unwrap_err();
        assert!(matches!(err, QcStatementError::UnknownCountryCode(c) if c == "ZZ"));
    }

    #[test]
    fn encoded_statements_decode_to_the_same_values() {
        let roles = [Role::AccountInformation, Role::PaymentInitiation];
        let der = Psd2QcStatements
            .encode(&roles, &fca(), CertificateType::Qseal)
            .unwrap();
        let contents = extract(&der).unwrap();
        assert_eq!(contents.roles, roles);
        assert_eq!(contents.authority, fca());
        assert_eq!(contents.certificate_type, CertificateType::Qseal);
    }

    #[test]
    fn takes_first_known_qc_type() {
        let der = statements_with_qc_types(&[OID_QCT_ESIGN, OID_QCT_WEB, OID_QCT_ESEAL]);
        let contents = extract(&der).unwrap();
        assert_eq!(contents.certificate_type, CertificateType::Qwac);
        assert_eq!(contents.roles, [Role::AccountInformation]);
        assert_eq!(contents.authority, fca());

        let der = statements_with_qc_types(&[OID_QCT_ESIGN]);
        assert!(matches!(
            extract(&der),
            Err(QcStatementError::UnknownQcType(t)) if t == "0.4.0.1862.1.6.1"
        ));
    }

    #[test]
    fn role_table_matches_accessors() {
        for (role, oid, name) in ROLES {
            assert_eq!(role.oid(), oid);
            assert_eq!(role.name(), name);
            assert_eq!(Role::from_oid(oid), Some(role));
            assert_eq!(name.parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn statements_start_with_qc_compliance() {
        let der = Psd2QcStatements
            .encode(&[Role::AccountServicing], &fca(), CertificateType::Qwac)
            .unwrap();
        // SEQUENCE { SEQUENCE { OID 0.4.0.1862.1.1 } ...
        assert_eq!(der[0], 0x30);
        assert_eq!(
            &der[2..12],
            &[0x30, 0x08, 0x06, 0x06, 0x04, 0x00, 0x8e, 0x46, 0x01, 0x01]
        );
    }

    #[test]
    fn empty_roles_are_rejected() {
        let err = Psd2QcStatements
            .encode(&[], &fca(), CertificateType::Qwac)
            .unwrap_err();
        assert!(matches!(err, QcStatementError::NoRoles));
    }

    #[test]
    fn empty_authority_is_rejected() {
        let authority = CompetentAuthority::new("Financial Conduct Authority", "");
        let err = Psd2QcStatements
            .encode(&[Role::AccountInformation], &authority, CertificateType::Qwac)
            .unwrap_err();
        assert!(matches!(err, QcStatementError::EmptyAuthorityField("id")));
    }

    #[test]
    fn garbage_does_not_decode() {
        let err = extract(&[0x30, 0x03, 0x02, 0x01]).unwrap_err();
        assert!(matches!(err, QcStatementError::Asn1(_)));
        assert!(std::error::Error::source(&err).is_some());
        let only_compliance = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_QCS_QC_COMPLIANCE));
                });
            });
        });
        assert!(matches!(
            extract(&only_compliance),
            Err(QcStatementError::MissingStatement("QcType"))
        ));
    }

    #[test]
    fn parses_role_and_type_names() {
        assert_eq!("PSP_AI".parse::<Role>().unwrap(), Role::AccountInformation);
        assert_eq!(Role::IssuingOfCardBasedPaymentInstruments.to_string(), "PSP_IC");
        assert!("PSP_XX".parse::<Role>().is_err());
        assert_eq!("qseal".parse::<CertificateType>().unwrap(), CertificateType::Qseal);
        assert!(matches!(
            "QCERT".parse::<CertificateType>(),
            Err(Error::UnsupportedCertificateType(t)) if t == "QCERT"
        ));
        assert!(matches!(
            CertificateType::from_qc_type_oid(&[0, 4, 0, 1862, 1, 6, 1]),
            Err(Error::UnsupportedCertificateType(t)) if t == "0.4.0.1862.1.6.1"
        ));
    }
}
