//! Subject distinguished name for qualified certificate requests.
//!
//! eIDAS validators expect the attributes in a fixed order, so the name is
//! written by hand rather than through a name builder that may reorder or
//! merge entries. Each attribute gets its own RDN.
use yasna::models::ObjectIdentifier;

pub const OID_COUNTRY_NAME: &[u64] = &[2, 5, 4, 6];
pub const OID_ORGANIZATION_NAME: &[u64] = &[2, 5, 4, 10];
pub const OID_ORGANIZATION_IDENTIFIER: &[u64] = &[2, 5, 4, 97];
pub const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];

/// Returns the DER `RDNSequence` for
/// `C=<country>, O=<organization>, organizationIdentifier=<id>, CN=<common name>`.
///
/// Values are not validated.
pub fn build_subject(
    country_code: &str,
    organization: &str,
    organization_id: &str,
    common_name: &str,
) -> Vec<u8> {
    let attributes = [
        (OID_COUNTRY_NAME, country_code),
        (OID_ORGANIZATION_NAME, organization),
        (OID_ORGANIZATION_IDENTIFIER, organization_id),
        (OID_COMMON_NAME, common_name),
    ];

    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for (oid, value) in attributes {
                writer.next().write_set(|writer| {
                    writer.next().write_sequence(|writer| {
                        writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
                        if is_printable(value) {
                            writer.next().write_printable_string(value);
                        } else {
                            writer.next().write_utf8_string(value);
                        }
                    });
                });
            }
        });
    })
}

fn is_printable(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_keep_their_order() {
        let der = build_subject("GB", "Foo Org", "Foo Org ID", "Foo Name");
        let oids = yasna::parse_der(&der, |reader| {
            let mut oids = Vec::new();
            reader.read_sequence_of(|reader| {
                reader.read_set_of(|reader| {
                    let oid = reader.read_sequence(|reader| {
                        let oid = reader.next().read_oid()?;
                        let _value = reader.next().read_der()?;
                        Ok(oid)
                    })?;
                    oids.push(oid.components().clone());
                    Ok(())
                })
            })?;
            Ok(oids)
        })
        .unwrap();

        assert_eq!(
            oids,
            vec![
                OID_COUNTRY_NAME.to_vec(),
                OID_ORGANIZATION_NAME.to_vec(),
                OID_ORGANIZATION_IDENTIFIER.to_vec(),
                OID_COMMON_NAME.to_vec(),
            ]
        );
    }

    #[test]
    fn country_is_a_printable_string() {
        let der = build_subject("GB", "O", "I", "C");
        // SEQUENCE, SET, SEQUENCE, OID 2.5.4.6, PrintableString "GB"
        assert_eq!(
            &der[2..15],
            &[0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x06, 0x13, 0x02, b'G', b'B']
        );
    }

    #[test]
    fn non_printable_values_fall_back_to_utf8() {
        assert!(is_printable("Foo Org ID"));
        assert!(!is_printable("Zürich Bank"));
        assert!(!is_printable("a@b"));

        let der = build_subject("CH", "Zürich Bank", "I", "C");
        assert!(der.windows(2).any(|w| w == [0x0c, "Zürich Bank".len() as u8]));
    }
}
