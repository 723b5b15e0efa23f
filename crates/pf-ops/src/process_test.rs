use super::*;

fn output(stderr: &str, exit_code: Option<i32>) -> ProcessOutput {
    ProcessOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code,
    }
}

#[test]
fn test_clean_exit_is_success() {
    assert_eq!(
        output("", Some(0)).failure_reason(FailurePolicy::StderrOrExitCode),
        None
    );
}

#[test]
fn test_stderr_with_zero_exit_fails() {
    let out = output("pg_dump: error: permission denied\n", Some(0));
    assert_eq!(
        out.failure_reason(FailurePolicy::StderrOrExitCode).as_deref(),
        Some("pg_dump: error: permission denied")
    );
}

#[test]
fn test_nonzero_exit_without_stderr_is_unknown_error() {
    let out = output("", Some(1));
    assert_eq!(
        out.failure_reason(FailurePolicy::StderrOrExitCode).as_deref(),
        Some(UNKNOWN_ERROR)
    );
}

#[test]
fn test_whitespace_stderr_counts_as_empty() {
    assert_eq!(
        output("  \n\t", Some(0)).failure_reason(FailurePolicy::StderrOrExitCode),
        None
    );
}

#[test]
fn test_exit_code_only_ignores_stderr() {
    let out = output("NOTICE: relation exists, skipping", Some(0));
    assert_eq!(out.failure_reason(FailurePolicy::ExitCodeOnly), None);

    let out = output("ERROR: role missing", Some(1));
    assert_eq!(
        out.failure_reason(FailurePolicy::ExitCodeOnly).as_deref(),
        Some("ERROR: role missing")
    );
}

#[test]
fn test_signal_termination_is_failure() {
    assert_eq!(
        output("", None)
            .failure_reason(FailurePolicy::ExitCodeOnly)
            .as_deref(),
        Some(UNKNOWN_ERROR)
    );
}

#[test]
fn test_display_and_debug_hide_secrets() {
    let inv = ProcessInvocation::new("pg_dump")
        .args(["--host", "db", "--file", "/tmp/my backup.sql"])
        .env_secret("PGPASSWORD", Secret::new("hunter2"));

    let shown = inv.display_command();
    assert_eq!(
        shown,
        "PGPASSWORD=*** pg_dump --host db --file '/tmp/my backup.sql'"
    );
    assert!(!format!("{:?}", inv).contains("hunter2"));
    assert_eq!(inv.env_keys().collect::<Vec<_>>(), vec!["PGPASSWORD"]);
}

#[cfg(unix)]
mod unix {
    use super::*;

    fn sh(script: &str) -> ProcessInvocation {
        ProcessInvocation::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_captures_stdout_stderr_and_exit_code() {
        let out = ProcessRunner
            .run(&sh("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_zero_exit_with_stderr_classified_failed() {
        let out = ProcessRunner
            .run(&sh("echo 'warning: something' >&2"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(
            out.failure_reason(FailurePolicy::StderrOrExitCode)
                .as_deref(),
            Some("warning: something")
        );
    }

    #[tokio::test]
    async fn test_stdin_script_is_delivered_and_closed() {
        let inv = ProcessInvocation::new("cat").stdin_script("line one\nline two\n");
        let out = ProcessRunner.run(&inv).await.unwrap();
        assert_eq!(out.stdout, "line one\nline two\n");
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_unread_stdin_does_not_fail_run() {
        let inv = sh("exit 0").stdin_script("x".repeat(1 << 20));
        let out = ProcessRunner.run(&inv).await.unwrap();
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_env_is_passed_to_child_only() {
        let inv = sh("printf %s \"$PGFERRY_TEST_SECRET\"")
            .env_secret("PGFERRY_TEST_SECRET", Secret::new("s3cret"));
        let out = ProcessRunner.run(&inv).await.unwrap();
        assert_eq!(out.stdout, "s3cret");
        assert!(std::env::var("PGFERRY_TEST_SECRET").is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let inv = ProcessInvocation::new("/nonexistent/pgferry-no-such-tool");
        let err = ProcessRunner.run(&inv).await.unwrap_err();
        assert!(matches!(err, ProcessError::Launch { .. }));
        assert!(err.to_string().contains("pgferry-no-such-tool"));
    }
}
