use daemonkit::cli::{print_error, Cli};

fn main() {
    daemonkit::logging::init();

    if let Err(e) = Cli::run() {
        print_error(&e.to_string());
        // process::exit still runs the PID file cleanup hook in a detached daemon
        std::process::exit(1);
    }
}
