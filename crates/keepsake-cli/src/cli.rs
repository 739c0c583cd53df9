use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keepsake_sdk::Direction;

#[derive(Parser)]
#[command(
    name = "keepsake",
    about = "Keepsake: edit a story timeline and export it as a single HTML page",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file [default: ./keepsake.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory from the configuration
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum MoveDirection {
    Up,
    Down,
}

impl From<MoveDirection> for Direction {
    fn from(direction: MoveDirection) -> Self {
        match direction {
            MoveDirection::Up => Direction::Up,
            MoveDirection::Down => Direction::Down,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a configuration file and create the stores
    Init(InitArgs),
    /// Show the story outline and storage usage
    Status(StatusArgs),
    /// Add, remove, move or edit timeline moments
    Node(NodeArgs),
    /// Edit the content blocks of a moment
    Block(BlockArgs),
    /// Edit blocks placed between moments
    Standalone(StandaloneArgs),
    /// Edit the closing page
    Ending(EndingArgs),
    /// Set or reset the background music
    Music(MusicArgs),
    /// Render the story as an HTML fragment (or JSON with --format json)
    Render(RenderArgs),
    /// Export the story as one self-contained HTML file
    Export(ExportArgs),
    /// Write a JSON backup of the story
    Backup(BackupArgs),
    /// Restore a JSON backup
    Import(ImportArgs),
    /// Show storage usage
    Usage(UsageArgs),
    /// Remove the saved story (media and avatar data are kept)
    Clear(ClearArgs),
    /// Replace the story with the built-in one
    Reset(ResetArgs),
    /// Turn edit mode on or off
    Edit(EditArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Directory to initialize [default: .]
    pub path: Option<PathBuf>,
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub action: NodeAction,
}

#[derive(Subcommand)]
pub enum NodeAction {
    /// Append a blank moment
    Add,
    /// Delete the moment at INDEX
    Rm { index: usize },
    /// Move the moment at INDEX one step
    Mv { index: usize, direction: MoveDirection },
    /// Set `date`, `title` or `highlight`
    Set {
        index: usize,
        field: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

#[derive(Args)]
pub struct BlockArgs {
    #[command(subcommand)]
    pub action: BlockAction,
}

#[derive(Subcommand)]
pub enum BlockAction {
    AddText {
        node: usize,
        #[arg(allow_hyphen_values = true)]
        text: String,
    },
    AddImage { node: usize, file: PathBuf },
    AddVideo { node: usize, file: PathBuf },
    Rm { node: usize, index: usize },
    Mv {
        node: usize,
        index: usize,
        direction: MoveDirection,
    },
    /// Set `content`, `alt`, `caption` or `poster`
    Set {
        node: usize,
        index: usize,
        field: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Swap the file behind an image or video block
    Replace {
        node: usize,
        index: usize,
        file: PathBuf,
    },
}

#[derive(Args)]
pub struct StandaloneArgs {
    #[command(subcommand)]
    pub action: StandaloneAction,
}

#[derive(Subcommand)]
pub enum StandaloneAction {
    AddText {
        /// Index of the moment to place the block after; -1 for the top
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        after: i64,
        #[arg(allow_hyphen_values = true)]
        text: String,
    },
    AddImage {
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        after: i64,
        file: PathBuf,
    },
    Rm { id: String },
    Mv { id: String, direction: MoveDirection },
    Set {
        id: String,
        field: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    Replace { id: String, file: PathBuf },
}

#[derive(Args)]
pub struct EndingArgs {
    #[command(subcommand)]
    pub action: EndingAction,
}

#[derive(Subcommand)]
pub enum EndingAction {
    /// Set `message`, `signature`, `name` or `date`
    Set {
        field: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

#[derive(Args)]
pub struct MusicArgs {
    #[command(subcommand)]
    pub action: MusicAction,
}

#[derive(Subcommand)]
pub enum MusicAction {
    Set { file: PathBuf },
    Reset,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Directory for the exported page
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Args)]
pub struct BackupArgs {
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct UsageArgs {}

#[derive(Args)]
pub struct ClearArgs {
    /// Confirm removal of the saved story
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ResetArgs {}

#[derive(Args)]
pub struct EditArgs {
    pub mode: Switch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["keepsake", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(_)));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::try_parse_from(["keepsake", "init", "--force", "/tmp/story"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert!(args.force);
            assert_eq!(args.path, Some(PathBuf::from("/tmp/story")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_node_move() {
        let cli = Cli::try_parse_from(["keepsake", "node", "mv", "2", "up"]).unwrap();
        if let Command::Node(NodeArgs {
            action: NodeAction::Mv { index, direction },
        }) = cli.command
        {
            assert_eq!(index, 2);
            assert_eq!(Direction::from(direction), Direction::Up);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_block_set() {
        let cli =
            Cli::try_parse_from(["keepsake", "block", "set", "0", "1", "caption", "At the lake"])
                .unwrap();
        if let Command::Block(BlockArgs {
            action: BlockAction::Set { node, index, field, value },
        }) = cli.command
        {
            assert_eq!((node, index), (0, 1));
            assert_eq!(field, "caption");
            assert_eq!(value, "At the lake");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_standalone_anchor() {
        let cli = Cli::try_parse_from(["keepsake", "standalone", "add-text", "hello"]).unwrap();
        if let Command::Standalone(StandaloneArgs {
            action: StandaloneAction::AddText { after, .. },
        }) = cli.command
        {
            assert_eq!(after, -1);
        } else {
            panic!("wrong command");
        }

        let cli = Cli::try_parse_from([
            "keepsake", "standalone", "add-text", "--after", "3", "later",
        ])
        .unwrap();
        if let Command::Standalone(StandaloneArgs {
            action: StandaloneAction::AddText { after, text },
        }) = cli.command
        {
            assert_eq!(after, 3);
            assert_eq!(text, "later");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_negative_anchor() {
        let cli = Cli::try_parse_from([
            "keepsake", "standalone", "add-image", "--after", "-1", "a.png",
        ])
        .unwrap();
        if let Command::Standalone(StandaloneArgs {
            action: StandaloneAction::AddImage { after, file },
        }) = cli.command
        {
            assert_eq!(after, -1);
            assert_eq!(file, PathBuf::from("a.png"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_edit_switch() {
        let cli = Cli::try_parse_from(["keepsake", "edit", "off"]).unwrap();
        if let Command::Edit(args) = cli.command {
            assert_eq!(args.mode, Switch::Off);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "keepsake", "status", "--data-dir", "/srv/story", "-v", "--format", "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/story")));
    }

    #[test]
    fn clear_requires_flag_to_parse_as_confirmed() {
        let cli = Cli::try_parse_from(["keepsake", "clear"]).unwrap();
        if let Command::Clear(args) = cli.command {
            assert!(!args.yes);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn command_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
