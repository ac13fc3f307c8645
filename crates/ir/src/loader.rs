use std::fs;
use std::path::Path;

use crate::error::IrError;
use crate::package::Package;

/// Reads and validates a `Package` from a JSON fixture on disk.
///
/// The frontend that lowers source programs to this IR lives outside this
/// crate; this is the format a runnable `p4tv` reads test programs and CLI
/// input from.
pub fn load_package(path: &Path) -> Result<Package, IrError> {
    let text = fs::read_to_string(path).map_err(|source| IrError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let package: Package = serde_json::from_str(&text).map_err(|source| IrError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    package.check_references()?;
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rejects_dangling_pipeline_reference() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name":"p","pipelines":{{"ingress":"missing"}}}}"#
        )
        .unwrap();
        let err = load_package(file.path()).unwrap_err();
        assert!(matches!(err, IrError::DanglingReference { .. }));
    }

    #[test]
    fn loads_minimal_package() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "name": "p",
                "controls": {{
                    "ingress": {{
                        "name": "ingress",
                        "params": [],
                        "locals": [],
                        "body": {{"kind": "block", "statements": []}}
                    }}
                }},
                "pipelines": {{"ingress": "ingress"}}
            }}"#
        )
        .unwrap();
        let pkg = load_package(file.path()).unwrap();
        assert_eq!(pkg.pipeline_names().collect::<Vec<_>>(), vec!["ingress"]);
    }
}
