use eidas_csr::{CertificateType, CsrBuilder, Role};
use std::fs;
use tracing_subscriber::EnvFilter;

/// Create a QWAC and a QSEAL signing request for the same organisation
/// and save the requests and private keys as PEM in the folder csrs.
/// Run with RUST_LOG=debug to see how the requests are assembled.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    fs::create_dir_all("./csrs")?;
    let organisation = || {
        CsrBuilder::new()
            .country_code("GB")
            .organization("Foo Org")
            .organization_id("PSDGB-FCA-123456")
            .common_name("0015800001041REAAY")
            .roles(vec![Role::AccountInformation, Role::PaymentInitiation])
    };

    println!("Generating QWAC signing request and key...");
    let qwac = organisation()
        .certificate_type(CertificateType::Qwac)
        .dns_name("api.foo.example.com")
        .generate()?;
    fs::write("./csrs/qwac.csr", qwac.csr_pem()?)?;
    fs::write("./csrs/qwac.key", qwac.private_key_pem()?)?;

    println!("Generating QSEAL signing request and key...");
    let qseal = organisation()
        .certificate_type(CertificateType::Qseal)
        .generate()?;
    fs::write("./csrs/qseal.csr", qseal.csr_pem()?)?;
    fs::write("./csrs/qseal.key", qseal.private_key_pem()?)?;

    println!("Done, inspect with: openssl req -in ./csrs/qwac.csr -noout -text");
    Ok(())
}
