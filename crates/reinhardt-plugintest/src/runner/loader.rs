//! Loading suites from paths

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::case::{TestCase, TestFailure, TestSuite};
use super::config::Config;
use crate::error::{RunnerError, RunnerResult};

/// Names that look like tests: `test` or `Test` at the start of the name or
/// after a `_`, `.`, `/` or `-`.
pub static TEST_MATCH: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?:^|[\x08_\./-])[Tt]est").expect("test name pattern is valid"));

/// Turns a suite path from the command line into tests.
pub trait Loader: Send + Sync {
	fn load(&self, path: &Path, config: &Config) -> RunnerResult<TestSuite>;
}

/// Runs test executables.
///
/// A directory contributes every executable file whose name matches
/// [`TEST_MATCH`], in name order. A file path is a single test. A test
/// passes when the program exits with status 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryLoader;

impl DirectoryLoader {
	pub fn new() -> Self {
		Self
	}

	fn executable_test(path: PathBuf, env: BTreeMap<String, String>) -> TestCase {
		let name = path
			.file_name()
			.map(|n| n.to_string_lossy().to_string())
			.unwrap_or_else(|| path.display().to_string());
		TestCase::new(name, move || {
			let output = Command::new(&path).envs(&env).output().map_err(|e| {
				TestFailure::error(format!("could not start {}: {}", path.display(), e))
			})?;
			if output.status.success() {
				return Ok(());
			}
			Err(TestFailure::fail(format!(
				"{} exited with {}",
				path.display(),
				output.status
			))
			.with_trace(String::from_utf8_lossy(&output.stderr)))
		})
	}
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;
	path.metadata()
		.map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
		.unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
	path.is_file()
}

impl Loader for DirectoryLoader {
	fn load(&self, path: &Path, config: &Config) -> RunnerResult<TestSuite> {
		let env = config.env().clone();
		if path.is_file() {
			return Ok(TestSuite::new().with_test(Self::executable_test(path.to_path_buf(), env)));
		}
		if !path.is_dir() {
			return Err(RunnerError::NoSuchSuite(path.to_path_buf()));
		}

		let entries = std::fs::read_dir(path).map_err(|source| RunnerError::Load {
			path: path.to_path_buf(),
			source,
		})?;
		let mut candidates = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|source| RunnerError::Load {
				path: path.to_path_buf(),
				source,
			})?;
			let file = entry.path();
			let name = entry.file_name().to_string_lossy().to_string();
			if !TEST_MATCH.is_match(&name) {
				tracing::trace!(%name, "ignored: name does not look like a test");
				continue;
			}
			if !is_executable(&file) {
				tracing::trace!(%name, "ignored: not executable");
				continue;
			}
			candidates.push(file);
		}
		candidates.sort();
		tracing::debug!(path = %path.display(), tests = candidates.len(), "loaded suite");
		Ok(candidates
			.into_iter()
			.map(|file| Self::executable_test(file, env.clone()))
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("test_basic", true)]
	#[case("Test", true)]
	#[case("unit_test", true)]
	#[case("unit-test.sh", true)]
	#[case("pkg.tests", true)]
	#[case("latest", false)]
	#[case("contest", false)]
	#[case("helper", false)]
	fn test_name_pattern(#[case] name: &str, #[case] expected: bool) {
		// Act & Assert
		assert_eq!(TEST_MATCH.is_match(name), expected);
	}

	#[rstest]
	fn test_missing_path_is_error() {
		// Arrange
		let loader = DirectoryLoader::new();

		// Act
		let result = loader.load(Path::new("/no/such/suite"), &Config::new());

		// Assert
		assert!(matches!(result, Err(RunnerError::NoSuchSuite(_))));
	}

	#[cfg(unix)]
	#[rstest]
	fn test_directory_loads_executable_tests_in_order() {
		use std::os::unix::fs::PermissionsExt;

		// Arrange
		let dir = tempfile::tempdir().unwrap();
		for (name, mode) in [
			("test_b", 0o755),
			("test_a", 0o755),
			("test_data.txt", 0o644),
			("helper", 0o755),
		] {
			let file = dir.path().join(name);
			std::fs::write(&file, "#!/bin/sh\nexit 0\n").unwrap();
			std::fs::set_permissions(&file, std::fs::Permissions::from_mode(mode)).unwrap();
		}

		// Act
		let suite = DirectoryLoader::new().load(dir.path(), &Config::new()).unwrap();

		// Assert
		let names: Vec<&str> = suite.iter().map(TestCase::name).collect();
		assert_eq!(names, vec!["test_a", "test_b"]);
	}
}
