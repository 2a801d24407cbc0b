//! Self-signed X.509 certificate support for the server identity.
//!
//! The certificate exists only as a container the client can pin and
//! pull the RSA public key back out of; there is no chain validation,
//! no CA, no revocation — `rcgen` builds it, `x509-parser` reads it back.

use anyhow::{anyhow, Context, Result};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::RsaPublicKey;

/// Extracts the RSA public key embedded in a self-signed certificate's
/// SubjectPublicKeyInfo. For RSA, the SPKI's `subject_public_key` bit
/// string payload is itself a PKCS#1 `RSAPublicKey` DER structure.
pub fn public_key_from_cert_pem(cert_pem: &str) -> Result<RsaPublicKey> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| anyhow!("malformed certificate PEM: {e}"))?;
    let cert = pem.parse_x509().context("parsing X.509 certificate DER")?;
    let spki = cert.public_key();
    let rsa_pkcs1_der = spki.subject_public_key.data.as_ref();
    RsaPublicKey::from_pkcs1_der(rsa_pkcs1_der)
        .context("decoding RSA public key from certificate SubjectPublicKeyInfo")
}

/// Builds a self-signed certificate over an externally-generated RSA
/// keypair (rcgen cannot generate RSA keys itself, only sign with one
/// supplied as PKCS#8).
pub fn build_self_signed_cert(private_key_pkcs8_pem: &str, common_name: &str) -> Result<String> {
    use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType, PKCS_RSA_SHA256};

    let key_pair = rcgen::KeyPair::from_pem_and_sign_algo(private_key_pkcs8_pem, &PKCS_RSA_SHA256)
        .context("loading RSA keypair for certificate signing")?;

    let mut params = CertificateParams::new(Vec::<String>::new());
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::CountryName, "US");
    params.distinguished_name = dn;
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2035, 1, 1);
    params.alg = &PKCS_RSA_SHA256;
    params.key_pair = Some(key_pair);

    let cert = Certificate::from_params(params).context("building self-signed certificate")?;
    cert.serialize_pem().context("serializing certificate to PEM")
}
