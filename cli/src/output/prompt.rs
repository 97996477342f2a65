//! `DialoguerChooser`: terminal implementation of the `Chooser` port.

use std::io::IsTerminal as _;

use anyhow::{Context, Result};
use console::Term;
use dialoguer::{Input, Select};

use crate::application::ports::Chooser;

/// Prompts on stderr with `dialoguer`.
pub struct DialoguerChooser {
    interactive: bool,
}

impl DialoguerChooser {
    /// Prompts are only shown when both stdin and stderr are terminals and
    /// `non_interactive` is `false`.
    #[must_use]
    pub fn new(non_interactive: bool) -> Self {
        let interactive =
            !non_interactive && std::io::stdin().is_terminal() && Term::stderr().is_term();
        Self { interactive }
    }
}

impl Chooser for DialoguerChooser {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn choose(&self, prompt: &str, options: &[String], default: usize) -> Result<usize> {
        anyhow::ensure!(self.interactive, "cannot prompt for {prompt:?} without a terminal");
        Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(default)
            .interact_on(&Term::stderr())
            .with_context(|| format!("reading {prompt}"))
    }

    fn input(&self, prompt: &str) -> Result<String> {
        anyhow::ensure!(self.interactive, "cannot prompt for {prompt:?} without a terminal");
        Input::<String>::new()
            .with_prompt(prompt)
            .interact_text_on(&Term::stderr())
            .with_context(|| format!("reading {prompt}"))
    }
}
