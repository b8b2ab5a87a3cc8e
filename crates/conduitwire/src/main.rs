mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, EndpointArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "conduitwire", version, about = "Conduit protocol client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(flatten)]
    endpoint: EndpointArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, &cli.endpoint, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::TlsMode;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from(["conduitwire", "send", "Conduit 1", "hello"])
            .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
        assert_eq!(cli.endpoint.port, conduitwire::DEFAULT_PORT);
        assert_eq!(cli.endpoint.tls, TlsMode::Plain);
    }

    #[test]
    fn endpoint_flags_are_global() {
        let cli = Cli::try_parse_from([
            "conduitwire",
            "store",
            "c",
            "k",
            "v",
            "--host",
            "peer.example",
            "--port",
            "4000",
            "--tls",
            "system",
        ])
        .expect("endpoint flags should parse after the subcommand");

        assert_eq!(cli.endpoint.host, "peer.example");
        assert_eq!(cli.endpoint.port, 4000);
        assert_eq!(cli.endpoint.tls, TlsMode::System);
    }

    #[test]
    fn listen_requires_a_conduit() {
        let err = Cli::try_parse_from(["conduitwire", "listen"])
            .expect_err("listen without conduits should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_retrieve_flags() {
        let cli = Cli::try_parse_from([
            "conduitwire",
            "retrieve",
            "Conduit 1",
            "K",
            "--single",
            "--wait",
            "500ms",
        ])
        .expect("retrieve args should parse");

        match cli.command {
            Command::Retrieve(args) => {
                assert!(args.single);
                assert_eq!(args.wait, "500ms");
                assert_eq!(args.count, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn tls_help_points_tls_peers_at_insecure_mode() {
        use clap::CommandFactory;

        let command = Cli::command();
        let tls = command
            .get_arguments()
            .find(|arg| arg.get_id() == "tls")
            .expect("tls flag should exist");

        assert_eq!(tls.get_env(), Some(std::ffi::OsStr::new("CONDUITWIRE_TLS")));
        let help = tls.get_long_help().expect("tls has long help").to_string();
        assert!(help.contains("16666"), "help: {help}");
        assert!(help.contains("--tls insecure"), "help: {help}");
    }

    #[test]
    fn insecure_tls_flag_parses() {
        let cli = Cli::try_parse_from(["conduitwire", "--tls", "insecure", "send", "c", "m"])
            .expect("tls flag should parse");
        assert_eq!(cli.endpoint.tls, TlsMode::Insecure);
        assert_eq!(
            cli.endpoint.tls.policy(),
            conduitwire::TlsPolicy::AcceptAnyCertificate
        );
    }

    #[test]
    fn rejects_out_of_range_port() {
        let err = Cli::try_parse_from(["conduitwire", "--port", "70000", "version"])
            .expect_err("port above u16 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
