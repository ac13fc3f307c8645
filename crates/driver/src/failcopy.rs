use std::fs;
use std::path::Path;

/// Copies the two programs under comparison into `fail_dir`, preserving
/// their original file names, so a violation can be replayed later without
/// re-running the whole suite.
pub fn copy_failing_programs(fail_dir: &Path, program_paths: &[&Path]) -> std::io::Result<()> {
    fs::create_dir_all(fail_dir)?;
    for path in program_paths {
        let file_name = path.file_name().unwrap_or_else(|| path.as_os_str());
        fs::copy(path, fail_dir.join(file_name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn copies_named_files_into_fail_dir() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();

        let a = src_dir.path().join("a.json");
        let mut f = fs::File::create(&a).unwrap();
        writeln!(f, "{{}}").unwrap();

        copy_failing_programs(dst_dir.path(), &[a.as_path()]).unwrap();
        assert!(dst_dir.path().join("a.json").exists());
    }
}
