use std::{fs, io::Write, path::Path};

/// Replace `path` with `bytes` via write-to-temp + rename, so a crash never
/// leaves a half-written EEPROM image behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
