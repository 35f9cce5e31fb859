use assert_cmd::Command;

pub fn proust_cmd() -> Command {
	let mut cmd = Command::cargo_bin("proust").unwrap_or_else(|e| panic!("proust binary: {e}"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}
