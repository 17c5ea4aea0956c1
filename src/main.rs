//! shopfloor main entrypoint.

use shopfloor::run;
use shopfloor::ui::messages::error;

fn main() {
    if let Err(e) = run() {
        error(format!("Error: {e}"));
        std::process::exit(1);
    }
}
