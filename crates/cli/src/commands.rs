use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a CSV of site records, chunked and resumable
    Upload {
        #[arg(long, help = "CSV file to upload")]
        file: String,

        #[arg(long, help = "Display label for the job; defaults to the file name")]
        source_name: Option<String>,

        #[arg(long, help = "Postgres connection string for the target store")]
        conn_str: String,

        #[arg(long, help = "Records per bulk write")]
        chunk_size: Option<usize>,

        #[arg(
            long,
            help = "Run decoupled from this call and poll the ledger for progress"
        )]
        background: bool,

        #[arg(long, help = "Job state directory; defaults to ~/.siteload/state")]
        state_dir: Option<String>,
    },
    /// Resume an interrupted or failed job from its first unfinished chunk
    Resume {
        #[arg(long, help = "Job ID to resume")]
        job: String,

        #[arg(long, help = "Postgres connection string for the target store")]
        conn_str: String,

        #[arg(long, help = "Job state directory; defaults to ~/.siteload/state")]
        state_dir: Option<String>,
    },
    /// Request cancellation of an active job
    Cancel {
        #[arg(long, help = "Job ID to cancel")]
        job: String,

        #[arg(long, help = "Postgres connection string for the target store")]
        conn_str: String,

        #[arg(long, help = "Job state directory; defaults to ~/.siteload/state")]
        state_dir: Option<String>,
    },
    /// Show the ledger entry for one job
    Status {
        #[arg(long, help = "Job ID to inspect")]
        job: String,

        #[arg(
            long,
            help = "If set, prints the job as JSON instead of a table"
        )]
        json: bool,

        #[arg(long, help = "Job state directory; defaults to ~/.siteload/state")]
        state_dir: Option<String>,
    },
    /// List resumable jobs, most recent first
    Jobs {
        #[arg(long, help = "Only jobs for this source label")]
        source: Option<String>,

        #[arg(
            long,
            help = "If set, prints the jobs as JSON instead of a table"
        )]
        json: bool,

        #[arg(long, help = "Job state directory; defaults to ~/.siteload/state")]
        state_dir: Option<String>,
    },
}
