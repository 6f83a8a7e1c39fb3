//! Definition of CLI commands/sub commands + its option parameters
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "tweetscounter", about = "Who tweets the most on your home timeline")]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Action,

    /// Use a different credential file.
    #[structopt(parse(from_os_str), short, long)]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
pub enum Action {
    #[structopt(about = "Fetch your home timeline and rank the users by their number of tweets")]
    Count {
        #[structopt(
            short,
            long,
            help = "Only count the tweets up to this tweet id e.g. 1050118621198921728"
        )]
        before: Option<String>,

        #[structopt(
            short,
            long,
            help = "Maximum number of requests, 200 tweets each (default: 4)"
        )]
        pages: Option<usize>,

        #[structopt(short, long, default_value = "20", help = "Number of users to show")]
        top: usize,

        #[structopt(short, long, help = "Also list the counted tweets of this user e.g. @jack")]
        user: Option<String>,

        #[structopt(
            parse(from_os_str),
            short,
            long,
            help = "Save the ranking and the cursor as JSON"
        )]
        output: Option<PathBuf>,
    },
    #[structopt(about = "Show a user profile, yours by default")]
    Profile {
        #[structopt(help = "Id of the user")]
        user_id: Option<String>,
    },
}
