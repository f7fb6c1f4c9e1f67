// Demo binary: parse SELECT statements and print their canonical JSON maps.
//
//   select-ast [--lenient] [--full-having] [--pretty] SELECT ...
//
// With no SQL argument it walks a fixed set of demo queries.

use anyhow::{Context, Result};
use clap::Parser as _;
use colored::*;
use select_ast::{
    tokenize, Canonical, ConditionGrammar, ParseReport, Parser, ParserConfig, WhereMode,
    WhereStatus,
};
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser, Debug)]
#[command(name = "select-ast")]
#[command(about = "Parse a SELECT statement and print its canonical JSON map")]
struct Cli {
    /// Keep a partial WHERE condition instead of failing on it
    #[arg(long)]
    lenient: bool,

    /// Parse HAVING with the full WHERE grammar
    #[arg(long)]
    full_having: bool,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,

    /// SQL words, joined with spaces. Runs the demo queries when empty.
    #[arg(trailing_var_arg = true)]
    sql: Vec<String>,
}

impl Cli {
    fn config(&self) -> ParserConfig {
        let mut config = ParserConfig::default();
        if self.lenient {
            config = config.with_where_mode(WhereMode::Lenient);
        }
        if self.full_having {
            config = config.with_having_grammar(ConditionGrammar::WHERE);
        }
        config
    }

    fn query(&self) -> Option<String> {
        (!self.sql.is_empty()).then(|| self.sql.join(" "))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.query() {
        Some(sql) => {
            let report = parse(&sql, config)?;
            print_report(&report, cli.pretty)
        }
        None => run_demo(config, cli.pretty),
    }
}

fn parse(sql: &str, config: ParserConfig) -> Result<ParseReport> {
    let tokens = tokenize(sql).with_context(|| format!("failed to tokenize {:?}", sql))?;

    match Parser::with_config(&tokens, config).parse_report() {
        Ok(report) => Ok(report),
        Err(err) => {
            eprintln!("{}", err.report(&tokens));
            Err(err).with_context(|| format!("failed to parse {:?}", sql))
        }
    }
}

fn print_report(report: &ParseReport, pretty: bool) -> Result<()> {
    let map = report.query.to_canonical_map();
    let json = if pretty {
        serde_json::to_string_pretty(&map)
    } else {
        serde_json::to_string(&map)
    }
    .context("failed to serialize canonical map")?;

    println!("{}", json);

    if let WhereStatus::Truncated(err) = &report.where_status {
        eprintln!("{} WHERE truncated: {}", "warning:".yellow().bold(), err);
    }

    Ok(())
}

fn run_demo(config: ParserConfig, pretty: bool) -> Result<()> {
    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", "SELECT statement parser".bright_yellow().bold());
    println!("{}", "=".repeat(60).bright_blue());

    let examples = vec![
        ("Simple SELECT", "SELECT column1 FROM table1"),
        ("Wildcard", "SELECT * FROM users u"),
        (
            "Precedence",
            "SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3",
        ),
        (
            "Predicates",
            "SELECT id FROM t WHERE name LIKE 'a%' AND id IN (1, 2, 3) AND age BETWEEN 10 AND 20 AND deleted_at IS NULL",
        ),
        (
            "Joins",
            "SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id LEFT JOIN items i ON o.id = i.order_id",
        ),
        (
            "Grouping",
            "SELECT dept, COUNT(*) AS n FROM staff GROUP BY dept HAVING COUNT(*) > 5 ORDER BY dept DESC",
        ),
        ("Typo", "SELECT * FROM t WHERE a IS 5"),
        ("Subquery", "SELECT * FROM (SELECT * FROM t) d"),
    ];

    for (desc, sql) in examples {
        println!("\n{}: {}", desc.yellow(), sql);

        let tokens = tokenize(sql).with_context(|| format!("failed to tokenize {:?}", sql))?;
        match Parser::with_config(&tokens, config).parse_report() {
            Ok(report) => {
                println!("  {} {}", "✓".green(), report.query.to_string().dimmed());
                print_report(&report, pretty)?;
            }
            Err(err) => {
                println!("  {} {}", "✗".red(), err);
                println!("{}", err.report(&tokens));
            }
        }
    }

    Ok(())
}
