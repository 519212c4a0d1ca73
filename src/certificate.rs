//! PKCS#12 → PEM conversion for Launchpad TLS client authentication.
//!
//! [`Pkcs12Resolver`] decrypts the PKI bundle kept in the object store and writes the private
//! key (unencrypted PKCS#8) followed by the main certificate and any additional chain
//! certificates into a single PEM file. The file lives exactly as long as the returned
//! [`ClientCertificate`]; dropping it removes the file, so the decrypted key never outlives the
//! request that needed it.

// std
use std::{io::Write, path::Path};
// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use p12_keystore::{KeyStore, KeyStoreEntry};
use tempfile::NamedTempFile;
// self
use crate::_prelude::*;

const PEM_LINE_WIDTH: usize = 64;

/// Failures raised while turning a PKCS#12 bundle into a client certificate.
#[derive(Debug, ThisError)]
pub enum CertificateError {
	/// Bundle is malformed or the passphrase is wrong.
	#[error("PKCS#12 bundle could not be decrypted: {message}.")]
	Parse {
		/// Decoder message.
		message: String,
	},
	/// Bundle holds no private key.
	#[error("PKCS#12 bundle is missing the private key.")]
	MissingPrivateKey,
	/// Bundle holds no certificate.
	#[error("PKCS#12 bundle is missing the certificate.")]
	MissingCertificate,
	/// Temporary PEM file could not be written.
	#[error("Client certificate file could not be written.")]
	Io(#[from] std::io::Error),
}

/// Scoped PEM client certificate backed by a `0600` temporary file.
pub struct ClientCertificate {
	file: NamedTempFile,
}
impl ClientCertificate {
	/// Writes `pem` to a fresh temporary file.
	pub fn from_pem(pem: &[u8]) -> Result<Self, CertificateError> {
		let mut file = tempfile::Builder::new().prefix("cmr-broker-").suffix(".pem").tempfile()?;

		file.write_all(pem)?;
		file.flush()?;

		Ok(Self { file })
	}

	/// Location of the PEM file, usable as a client-certificate file by TLS stacks.
	pub fn path(&self) -> &Path {
		self.file.path()
	}

	/// Reads the PEM stream back.
	pub fn pem(&self) -> Result<Vec<u8>, CertificateError> {
		Ok(std::fs::read(self.path())?)
	}
}
impl Debug for ClientCertificate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCertificate").field("path", &self.path()).finish()
	}
}

/// Turns a stored certificate bundle into a transport-usable client certificate.
pub trait CertificateResolver
where
	Self: Send + Sync,
{
	/// Decrypts `bundle` with `passphrase`.
	fn resolve(
		&self,
		bundle: &[u8],
		passphrase: &Secret,
	) -> Result<ClientCertificate, CertificateError>;
}

/// Pure-Rust PKCS#12 resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pkcs12Resolver;
impl CertificateResolver for Pkcs12Resolver {
	fn resolve(
		&self,
		bundle: &[u8],
		passphrase: &Secret,
	) -> Result<ClientCertificate, CertificateError> {
		let pem = pkcs12_to_pem(bundle, passphrase)?;

		ClientCertificate::from_pem(pem.as_bytes())
	}
}

/// Decrypts a PKCS#12 bundle into a PEM stream: key, main certificate, then chain.
pub fn pkcs12_to_pem(bundle: &[u8], passphrase: &Secret) -> Result<String, CertificateError> {
	let keystore = KeyStore::from_pkcs12(bundle, passphrase.expose())
		.map_err(|e| CertificateError::Parse { message: e.to_string() })?;
	let mut entries: Vec<_> = keystore.entries().collect();

	entries.sort_by(|(a, _), (b, _)| a.cmp(b));

	let mut private_key = None;
	let mut certificates = Vec::new();
	let mut loose_certificates = Vec::new();

	for (_, entry) in entries {
		match entry {
			KeyStoreEntry::PrivateKeyChain(chain) if private_key.is_none() => {
				private_key = Some(chain.key());
				certificates.extend(chain.chain().iter().map(|cert| cert.as_der()));
			},
			KeyStoreEntry::Certificate(cert) => loose_certificates.push(cert.as_der()),
			_ => {},
		}
	}

	let private_key = private_key.ok_or(CertificateError::MissingPrivateKey)?;

	certificates.extend(loose_certificates);

	if certificates.is_empty() {
		return Err(CertificateError::MissingCertificate);
	}

	Ok(pem_bundle(private_key, certificates))
}

/// Concatenates a PKCS#8 private key and DER certificates into one PEM stream.
pub fn pem_bundle<'a, I>(private_key: &[u8], certificates: I) -> String
where
	I: IntoIterator<Item = &'a [u8]>,
{
	let mut pem = pem_block("PRIVATE KEY", private_key);

	for certificate in certificates {
		pem.push_str(&pem_block("CERTIFICATE", certificate));
	}

	pem
}

fn pem_block(label: &str, der: &[u8]) -> String {
	let encoded = STANDARD.encode(der);
	let mut block = format!("-----BEGIN {label}-----\n");

	for line in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
		// Base64 output is ASCII.
		block.push_str(&String::from_utf8_lossy(line));
		block.push('\n');
	}

	block.push_str(&format!("-----END {label}-----\n"));

	block
}
