use anyhow::Result;
use clap::Parser;
use ppbench::cli::{Args, Command};
use ppbench::collector::create_endpoint;
use ppbench::{load, BenchmarkConfig, BenchmarkRunner};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a small run configuration against `host`
fn run_config(output: &std::path::Path, host: &str, mode: &str) -> Result<BenchmarkConfig> {
    let args = Args::parse_from([
        "ppbench",
        "run",
        output.to_str().unwrap(),
        "--host",
        host,
        "--mode",
        mode,
        "--machine",
        "local",
        "--experiment",
        "stub",
        "--min",
        "1",
        "--max",
        "201",
        "--coverage",
        "0.1",
        "-c",
        "4",
        "-r",
        "2",
        "--timeout",
        "5s",
        "--max-tries",
        "3",
    ]);
    let Command::Run(run) = args.command else {
        panic!("expected run command");
    };
    BenchmarkConfig::from_args(&run)
}

/// A measured run writes one record per trial with the reported figures.
#[tokio::test]
async fn measured_run_against_stub() -> Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "duration": 2.0,
            "length": 100,
            "status": 200,
            "retries": 0
        })))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new()?;
    let output = dir.path().join("measured.csv");
    let config = run_config(&output, &mock_server.uri(), "measured")?;
    let endpoint = create_endpoint(config.mode, &config.host, &config.path, config.max_tries)?;

    let summary = BenchmarkRunner::new(config).run(endpoint).await?;
    assert_eq!(summary.trials, 20);
    assert_eq!(summary.records_written, 20);

    let records = load(&[&output])?;
    assert_eq!(records.len(), 20);
    for record in records {
        assert_eq!(record.machine_tag, "local");
        assert_eq!(record.experiment_tag, "stub");
        assert_eq!(record.total_transferred, 100);
        assert!((record.time_per_request - 2.0).abs() < 1e-9);
        assert!((record.transfer_rate - 50000.0).abs() < 1e-6);
        assert_eq!(record.failed_count, 0);
        assert_eq!(record.response_code, 200);
        assert!(record.document.starts_with("/mping/"));
    }
    Ok(())
}

/// Every request failing produces an empty result file, not an error.
#[tokio::test]
async fn always_failing_stub_writes_no_records() -> Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new()?;
    for mode in ["direct", "measured", "retrying"] {
        let output = dir.path().join(format!("{}.csv", mode));
        let config = run_config(&output, &mock_server.uri(), mode)?;
        let endpoint = create_endpoint(config.mode, &config.host, &config.path, config.max_tries)?;

        let summary = BenchmarkRunner::new(config).run(endpoint).await?;
        assert_eq!(summary.records_written, 0, "mode {}", mode);
        assert_eq!(summary.trials_skipped, 20, "mode {}", mode);
        assert!(load(&[&output])?.is_empty());
    }
    Ok(())
}
