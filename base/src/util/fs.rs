use std::fs::read;
use std::path::Path;

use crate::defs::{ErrorKind::IoError, IntoResult, Result};

fn describe_path(action: &str, path: &Path) -> String {
    match path.to_str() {
        Some(path) => format!("failed to {} file '{}'", action, path),
        None => format!("failed to {} file", action),
    }
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    read(path).res_as(IoError, || describe_path("read", path))
}

pub fn read_text_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let data = read_file(path)?;
    String::from_utf8(data).res_as(IoError, || describe_path("decode", path))
}
