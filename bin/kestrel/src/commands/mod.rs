pub mod genesis;
pub mod run;
pub mod transition;

use std::{fs, path::Path};

use anyhow::{Context, anyhow};
use ssz::{Decode, Encode};

pub fn read_ssz<T: Decode>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    T::from_ssz_bytes(&bytes)
        .map_err(|err| anyhow!("Failed to decode SSZ from {}: {err:?}", path.display()))
}

pub fn write_ssz<T: Encode>(path: &Path, value: &T) -> anyhow::Result<()> {
    fs::write(path, value.as_ssz_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}
