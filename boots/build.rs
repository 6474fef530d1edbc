//! Selects the signing key compiled into the binary.
//!
//! `BOOTS_TRUST_ANCHOR` may hold the absolute path of an armored public key
//! to embed instead of `keys/image-signing-key.asc`. Release builds point it
//! at the published Flatcar image signing key.

use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

const DEFAULT_ANCHOR: &str = "keys/image-signing-key.asc";
const OVERRIDE_VAR: &str = "BOOTS_TRUST_ANCHOR";
const ARMOR_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";

fn main() -> Result<(), Box<dyn Error>> {
    let source = env::var_os(OVERRIDE_VAR)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_ANCHOR), PathBuf::from);
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?);

    let material = fs::read_to_string(&source)
        .map_err(|e| format!("cannot read trust anchor {}: {e}", source.display()))?;
    if !material.contains(ARMOR_HEADER) {
        return Err(format!("{} is not an armored public key", source.display()).into());
    }
    fs::write(out_dir.join("trust-anchor.asc"), material)?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "cargo:rerun-if-env-changed={OVERRIDE_VAR}")?;
    writeln!(stdout, "cargo:rerun-if-changed={}", source.display())?;
    Ok(())
}
