use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::{X509Extension, X509Name, X509Req, X509ReqBuilder};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::extensions::{
    Extension, OID_SUBJECT_ALT_NAME, extended_key_usage_extension, extended_key_usage_for_type,
    key_usage_extension, key_usage_for_type, oid_to_string, qc_statements_extension,
    subject_alt_name_extension, subject_key_identifier,
};
use crate::qcstatements::{
    CertificateType, CompetentAuthorityLookup, NationalCompetentAuthorities, Psd2QcStatements,
    QcStatementCodec, Role,
};
use crate::subject::build_subject;

/// Modulus size of keys generated by [`generate_request`].
pub const GENERATED_KEY_BITS: u32 = 2048;

/// Everything the request is built from, apart from the key and options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParameters {
    /// ISO 3166 alpha-2 code, also used to find the competent authority.
    pub country_code: String,
    pub organization: String,
    /// Organization identifier, e.g. `PSDGB-FCA-123456`.
    pub organization_id: String,
    pub common_name: String,
    pub roles: Vec<Role>,
    pub certificate_type: CertificateType,
}

/// The request as seen by options, after the mandatory fields are set.
///
/// Options can add DNS names and extra extensions. The mandatory extensions
/// are not reachable from here.
#[derive(Debug)]
pub struct RequestTemplate {
    mandatory: Vec<Extension>,
    extra: Vec<Extension>,
    dns_names: Vec<String>,
}

impl RequestTemplate {
    fn new(mandatory: Vec<Extension>) -> Self {
        Self {
            mandatory,
            extra: Vec::new(),
            dns_names: Vec::new(),
        }
    }

    /// Adds a DNS subject alternative name.
    pub fn add_dns_name(&mut self, domain: impl Into<String>) {
        self.dns_names.push(domain.into());
    }

    /// Appends an extension after the mandatory ones. Signing fails if the
    /// OID is already in the request.
    pub fn add_extension(&mut self, extension: Extension) {
        self.extra.push(extension);
    }

    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    /// All extensions added so far, mandatory ones first.
    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.mandatory.iter().chain(&self.extra)
    }

    /// Extensions in request order and the DNS names for the trailing
    /// subject alternative name.
    fn into_parts(self) -> Result<(Vec<Extension>, Vec<String>)> {
        let mut extensions = self.mandatory;
        extensions.reserve(self.extra.len());
        for extension in self.extra {
            push_unique(&mut extensions, extension)?;
        }
        if !self.dns_names.is_empty() && extensions.iter().any(|e| e.oid() == OID_SUBJECT_ALT_NAME) {
            return Err(Error::DuplicateExtension(oid_to_string(OID_SUBJECT_ALT_NAME)));
        }
        Ok((extensions, self.dns_names))
    }
}

fn push_unique(extensions: &mut Vec<Extension>, extension: Extension) -> Result<()> {
    if extensions.iter().any(|e| e.oid() == extension.oid()) {
        return Err(Error::DuplicateExtension(oid_to_string(extension.oid())));
    }
    extensions.push(extension);
    Ok(())
}

/// A transformation applied to the request before it is signed.
pub trait RequestOption: Send + Sync {
    fn apply(&self, request: &mut RequestTemplate);
}

impl<F> RequestOption for F
where
    F: Fn(&mut RequestTemplate) + Send + Sync,
{
    fn apply(&self, request: &mut RequestTemplate) {
        self(request)
    }
}

pub type CertificateOption = Box<dyn RequestOption>;

/// Adds `domain` as a DNS subject alternative name.
pub fn with_dns_name(domain: impl Into<String>) -> CertificateOption {
    let domain = domain.into();
    Box::new(move |request: &mut RequestTemplate| request.add_dns_name(domain.clone()))
}

/// Adds an extra extension, e.g. a certificate policy requested by the CA.
pub fn with_extension(extension: Extension) -> CertificateOption {
    Box::new(move |request: &mut RequestTemplate| request.add_extension(extension.clone()))
}

/// A request signed with a freshly generated key.
pub struct GeneratedCsr {
    /// DER encoded PKCS#10 request.
    pub der: Vec<u8>,
    /// The generated RSA key. The caller is its only owner.
    pub private_key: PKey<Private>,
}

impl GeneratedCsr {
    pub fn csr_pem(&self) -> Result<Vec<u8>> {
        X509Req::from_der(&self.der)
            .and_then(|req| req.to_pem())
            .map_err(|source| Error::Encoding {
                what: "certificate request",
                source,
            })
    }

    /// PKCS#8 PEM of the private key.
    pub fn private_key_pem(&self) -> Result<Vec<u8>> {
        self.private_key
            .private_key_to_pem_pkcs8()
            .map_err(|source| Error::Encoding {
                what: "private key",
                source,
            })
    }
}

/// Builds and signs requests using a competent authority register and a QC
/// statement codec.
#[derive(Clone, Copy)]
pub struct RequestAssembler<'a> {
    authorities: &'a dyn CompetentAuthorityLookup,
    codec: &'a dyn QcStatementCodec,
}

impl Default for RequestAssembler<'static> {
    fn default() -> Self {
        Self::new(&NationalCompetentAuthorities, &Psd2QcStatements)
    }
}

impl<'a> RequestAssembler<'a> {
    pub fn new(
        authorities: &'a dyn CompetentAuthorityLookup,
        codec: &'a dyn QcStatementCodec,
    ) -> Self {
        Self { authorities, codec }
    }

    /// Builds a DER encoded request signed with `signing_key`, which must be RSA.
    pub fn build(
        &self,
        params: &RequestParameters,
        signing_key: &PKeyRef<Private>,
        options: &[CertificateOption],
    ) -> Result<Vec<u8>> {
        if signing_key.id() != Id::RSA {
            let found = key_type_name(signing_key.id());
            warn!(key_type = %found, "rejecting non RSA signing key");
            return Err(Error::UnsupportedKeyType(found));
        }
        let rsa = signing_key.rsa().map_err(|source| Error::Encoding {
            what: "RSA public key",
            source,
        })?;

        let authority = self
            .authorities
            .lookup(&params.country_code)
            .map_err(|source| Error::UnknownCountryCode {
                country: params.country_code.clone(),
                source,
            })?;
        debug!(
            country = %params.country_code,
            authority = %authority.id,
            "resolved competent authority"
        );

        let qc_statements = self
            .codec
            .encode(&params.roles, &authority, params.certificate_type)
            .map_err(Error::QcStatementEncodingFailed)?;

        let key_usage = key_usage_for_type(params.certificate_type)?;
        let extended_key_usage = extended_key_usage_for_type(params.certificate_type)?;

        let mut extensions = vec![key_usage_extension(key_usage)];
        if !extended_key_usage.is_empty() {
            extensions.push(extended_key_usage_extension(extended_key_usage));
        }
        extensions.push(subject_key_identifier(&rsa)?);
        extensions.push(qc_statements_extension(qc_statements));

        let subject = build_subject(
            &params.country_code,
            &params.organization,
            &params.organization_id,
            &params.common_name,
        );

        let mut template = RequestTemplate::new(extensions);
        for option in options {
            option.apply(&mut template);
        }
        let (extensions, dns_names) = template.into_parts()?;
        debug!(
            certificate_type = %params.certificate_type,
            extensions = extensions.len(),
            dns_names = dns_names.len(),
            "composed request extensions"
        );

        let subject = X509Name::from_der(&subject).map_err(|source| Error::Encoding {
            what: "subject",
            source,
        })?;
        let der = sign_request(&subject, signing_key, &extensions, &dns_names)?;
        debug!(len = der.len(), "signed certificate request");
        Ok(der)
    }

    /// Generates a [`GENERATED_KEY_BITS`] RSA key and builds a request with it.
    pub fn generate(
        &self,
        params: &RequestParameters,
        options: &[CertificateOption],
    ) -> Result<GeneratedCsr> {
        let private_key = Rsa::generate(GENERATED_KEY_BITS)
            .and_then(PKey::from_rsa)
            .map_err(Error::KeyGenerationFailed)?;
        let der = self.build(params, &private_key, options)?;
        Ok(GeneratedCsr { der, private_key })
    }
}

/// Builds a request with the built-in authority register and QC statement codec.
pub fn build_request(
    params: &RequestParameters,
    signing_key: &PKeyRef<Private>,
    options: &[CertificateOption],
) -> Result<Vec<u8>> {
    RequestAssembler::default().build(params, signing_key, options)
}

/// Generates an RSA key and builds a request with it.
pub fn generate_request(
    params: &RequestParameters,
    options: &[CertificateOption],
) -> Result<GeneratedCsr> {
    RequestAssembler::default().generate(params, options)
}

fn sign_request(
    subject: &X509Name,
    signing_key: &PKeyRef<Private>,
    extensions: &[Extension],
    dns_names: &[String],
) -> Result<Vec<u8>> {
    let builder = X509ReqBuilder::new().map_err(Error::SigningFailed)?;
    let mut stack = extension_stack(extensions).map_err(Error::SigningFailed)?;
    if !dns_names.is_empty() {
        let san = subject_alt_name_extension(&builder.x509v3_context(None), dns_names)?;
        stack.push(san).map_err(Error::SigningFailed)?;
    }
    finish_request(builder, subject, signing_key, &stack).map_err(Error::SigningFailed)
}

fn extension_stack(extensions: &[Extension]) -> Result<Stack<X509Extension>, ErrorStack> {
    let mut stack = Stack::new()?;
    for extension in extensions {
        stack.push(extension.to_x509_extension()?)?;
    }
    Ok(stack)
}

fn finish_request(
    mut builder: X509ReqBuilder,
    subject: &X509Name,
    signing_key: &PKeyRef<Private>,
    stack: &Stack<X509Extension>,
) -> Result<Vec<u8>, ErrorStack> {
    builder.set_version(0)?;
    builder.set_subject_name(subject)?;
    builder.set_pubkey(signing_key)?;
    builder.add_extensions(stack)?;
    builder.sign(signing_key, MessageDigest::sha256())?;
    builder.build().to_der()
}

fn key_type_name(id: Id) -> String {
    let known = [(Id::EC, "EC"), (Id::DSA, "DSA"), (Id::DH, "DH")];
    if let Some((_, name)) = known.iter().find(|(known_id, _)| *known_id == id) {
        return name.to_string();
    }
    Nid::from_raw(id.as_raw())
        .short_name()
        .map(str::to_string)
        .unwrap_or_else(|_| format!("key type {}", id.as_raw()))
}

/// Builder for a qualified certificate signing request.
///
/// Defaults to a QWAC with the built-in competent authority register and
/// the ETSI TS 119 495 QC statement codec.
#[derive(Default)]
pub struct CsrBuilder {
    params: RequestParameters,
    options: Vec<CertificateOption>,
    authorities: Option<Box<dyn CompetentAuthorityLookup>>,
    codec: Option<Box<dyn QcStatementCodec>>,
}

impl CsrBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    /// Country, two letter ISO 3166 code. Selects the competent authority.
    pub fn country_code(mut self, country_code: &str) -> Self {
        self.params.country_code = country_code.into();
        self
    }
    /// Organization name, O
    pub fn organization(mut self, organization: &str) -> Self {
        self.params.organization = organization.into();
        self
    }
    /// Organization identifier, for PSD2 usually `PSD<country>-<authority>-<id>`
    pub fn organization_id(mut self, organization_id: &str) -> Self {
        self.params.organization_id = organization_id.into();
        self
    }
    /// Common name, CN
    pub fn common_name(mut self, common_name: &str) -> Self {
        self.params.common_name = common_name.into();
        self
    }
    /// Replaces the PSD2 roles
    pub fn roles(mut self, roles: Vec<Role>) -> Self {
        self.params.roles = roles;
        self
    }
    pub fn role(mut self, role: Role) -> Self {
        self.params.roles.push(role);
        self
    }
    pub fn certificate_type(mut self, certificate_type: CertificateType) -> Self {
        self.params.certificate_type = certificate_type;
        self
    }
    /// Adds a DNS subject alternative name, kept in call order
    pub fn dns_name(self, domain: &str) -> Self {
        self.option(with_dns_name(domain))
    }
    /// Adds an option, applied in call order after the mandatory fields
    pub fn option(mut self, option: CertificateOption) -> Self {
        self.options.push(option);
        self
    }
    /// Uses another competent authority register
    pub fn authority_lookup(mut self, lookup: impl CompetentAuthorityLookup + 'static) -> Self {
        self.authorities = Some(Box::new(lookup));
        self
    }
    /// Uses another QC statement encoder
    pub fn qc_statement_codec(mut self, codec: impl QcStatementCodec + 'static) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }
    /// Builds and signs the request with an existing RSA key
    pub fn build_with_key(&self, signing_key: &PKeyRef<Private>) -> Result<Vec<u8>> {
        self.assembler()
            .build(&self.params, signing_key, &self.options)
    }
    /// Generates an RSA key and returns it with the signed request
    pub fn generate(&self) -> Result<GeneratedCsr> {
        self.assembler().generate(&self.params, &self.options)
    }

    fn assembler(&self) -> RequestAssembler<'_> {
        RequestAssembler::new(
            self.authorities
                .as_deref()
                .unwrap_or(&NationalCompetentAuthorities),
            self.codec.as_deref().unwrap_or(&Psd2QcStatements),
        )
    }
}
