// REPL entry point (§6): reads commands from stdin, one per line, and
// dispatches them against the data directory named by the first CLI
// argument (default ".").

use microql::config::Config;
use microql::repl::Repl;

fn main() {
    let data_dir = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let config = Config { data_dir: data_dir.into(), ..Config::default() };

    let mut repl = match Repl::new(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("fatal: {e}");
            std::process::exit(1);
        }
    };

    let stdin = std::io::stdin();
    let code = repl.run(stdin.lock(), &mut std::io::stderr());
    std::process::exit(code);
}
