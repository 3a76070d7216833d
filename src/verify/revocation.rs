// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::time::SystemTime;

use openssl::asn1::Asn1Time;
use openssl::x509::{CrlStatus, X509Crl, X509Ref};
use tracing::{debug, warn};
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::*;

use super::chain::{ChainCert, ValidatedChain};
use super::errors::Warning;
use super::from_unix;
use crate::store::ICrlStore;
use crate::Error;

/// Outcome of consulting the CRLs for a single certificate
enum Status {
    Good,
    Revoked,
    Unknown(String),
}

/// Consult the CRL distribution points of every certificate in `chain` (the
/// pinned root excluded).  A confirmed revocation is fatal.  A certificate
/// whose status cannot be established yields a warning instead.
pub fn check_revocation<S: ICrlStore + ?Sized>(
    chain: &ValidatedChain,
    store: &S,
    now: SystemTime,
) -> Result<Vec<Warning>, Error> {
    let mut warnings = Vec::new();

    for (index, c) in chain.certs().iter().enumerate() {
        match status(c, chain.issuer(index), store, now) {
            Status::Good => continue,
            Status::Revoked => {
                return Err(Error::CertificateRevoked {
                    index,
                    serial: serial_of(&c.x509),
                })
            }
            Status::Unknown(reason) => {
                warn!(index, %reason, "revocation status indeterminate, soft-failing");
                warnings.push(Warning::RevocationCheckIndeterminate {
                    index: Some(index),
                    reason,
                });
            }
        }
    }

    Ok(warnings)
}

fn status<S: ICrlStore + ?Sized>(
    c: &ChainCert,
    issuer: &X509Ref,
    store: &S,
    now: SystemTime,
) -> Status {
    let urls = match crl_urls(&c.der) {
        Ok(urls) => urls,
        Err(e) => return Status::Unknown(e),
    };

    if urls.is_empty() {
        debug!("no CRL distribution points, assuming not revoked");
        return Status::Good;
    }

    let mut reasons = Vec::new();

    // the first usable CRL is authoritative
    for url in urls.iter() {
        let crl = match usable_crl(url, issuer, store, now) {
            Ok(crl) => crl,
            Err(reason) => {
                debug!(%url, %reason, "CRL not usable");
                reasons.push(format!("{url}: {reason}"));
                continue;
            }
        };

        return match crl.get_by_cert(&c.x509) {
            CrlStatus::Revoked(_) => Status::Revoked,
            CrlStatus::NotRevoked | CrlStatus::RemoveFromCrl(_) => Status::Good,
        };
    }

    Status::Unknown(reasons.join("; "))
}

/// Fetch the CRL at `url` and make sure it was issued by `issuer` and is
/// current at `now`
fn usable_crl<S: ICrlStore + ?Sized>(
    url: &str,
    issuer: &X509Ref,
    store: &S,
    now: SystemTime,
) -> Result<X509Crl, String> {
    let der = store.fetch(url).map_err(|e| e.to_string())?;

    let crl = X509Crl::from_der(&der).map_err(|e| format!("parsing CRL: {e}"))?;

    let crl_issuer = crl.issuer_name().to_der().map_err(|e| e.to_string())?;
    let expected = issuer.subject_name().to_der().map_err(|e| e.to_string())?;

    if crl_issuer != expected {
        return Err("CRL issuer does not match certificate issuer".to_string());
    }

    let pkey = issuer.public_key().map_err(|e| e.to_string())?;

    if !crl.verify(&pkey).unwrap_or(false) {
        return Err("CRL signature does not verify".to_string());
    }

    if let Some(next_update) = crl.next_update() {
        let epoch = Asn1Time::from_unix(0).map_err(|e| e.to_string())?;
        let d = epoch.diff(next_update).map_err(|e| e.to_string())?;

        let next = from_unix(i64::from(d.days) * 86_400 + i64::from(d.secs));

        if next < now {
            return Err(format!("CRL is stale (next update {next_update})"));
        }
    }

    Ok(crl)
}

fn serial_of(x509: &X509Ref) -> String {
    x509.serial_number()
        .to_bn()
        .and_then(|bn| bn.to_hex_str().map(|s| s.to_string()))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// URIs from the CRL distribution points extension (RFC 5280 §4.2.1.13)
fn crl_urls(der: &[u8]) -> Result<Vec<String>, String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;

    let mut crl_urls = Vec::new();

    for ext in cert.extensions() {
        let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() else {
            continue;
        };

        for point in points.points.iter() {
            let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
                continue;
            };

            for name in names.iter() {
                if let GeneralName::URI(uri) = name {
                    crl_urls.push(uri.to_string());
                }
            }
        }
    }

    Ok(crl_urls)
}
