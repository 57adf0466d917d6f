use crate::pipeline::WaitStrategy;
use crate::quotes::DEFAULT_QUOTED_COMMAND;
use argh::FromArgs;

#[derive(FromArgs, Debug)]
/// Line-oriented command interpreter with pipes, file redirection and
/// background execution.
pub struct Args {
    #[argh(switch)]
    /// do not display the prompt (the default when stdin is not a terminal)
    pub no_prompt: bool,

    #[argh(option, default = "WaitStrategy::default()")]
    /// when to wait on foreground stages: each-stage (default) or all-stages
    pub wait: WaitStrategy,

    #[argh(option, default = "DEFAULT_QUOTED_COMMAND.to_string()")]
    /// command whose double-quoted arguments are unquoted (default: grep)
    pub quote_fix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: bool,
    pub wait: WaitStrategy,
    pub quote_fix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: true,
            wait: WaitStrategy::default(),
            quote_fix: DEFAULT_QUOTED_COMMAND.to_string(),
        }
    }
}

impl Config {
    /// `interactive` tells whether stdin is a terminal.
    pub fn from_args(args: Args, interactive: bool) -> Self {
        Self {
            prompt: interactive && !args.no_prompt,
            wait: args.wait,
            quote_fix: args.quote_fix,
        }
    }
}
