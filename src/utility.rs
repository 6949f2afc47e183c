//! Progress printing on the command line.

use std::io::{self, Write};

/// A progress bar of 100 steps, printed as a row of `=` on stdout.
pub struct ProgressBar {
    current_items: f64,
    item_size: f64,
    used: bool,
}

impl ProgressBar {
    /// Creates a progress bar tracking `num_items` items. An empty bar never prints.
    pub fn new(num_items: usize) -> ProgressBar {
        let item_size = if num_items == 0 {
            0.0
        } else {
            100.0 / (num_items as f64)
        };

        ProgressBar {
            current_items: 0.0,
            item_size,
            used: false,
        }
    }

    /// Marks one item as done, printing a step whenever another percent is reached.
    #[inline(always)]
    pub fn increment(&mut self) {
        self.current_items += self.item_size;

        while self.current_items >= 1.0 {
            print!("=");
            io::stdout().flush().expect("Could not flush stdout");
            self.current_items -= 1.0;
        }

        self.used = true;
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        if self.used {
            println!();
        }
    }
}
