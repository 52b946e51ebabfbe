//! `every8d` command-line client for the EVERY8D SMS/MMS HTTP API.

mod logging;
mod webhook;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use every8d::{
    Attachment, BatchId, Credentials, DeliveryStatusQuery, DeliveryStatusResponse, Destination,
    Every8dClient, Message, MessageContent, MessageKind, MessageNo, Mms, MmsFileType, PageNo,
    ReservationTime, RetryMinutes, SendOptions, SendResponse, Subject,
};
use serde::Serialize;

use crate::logging::LogLevel;

/// EVERY8D SMS/MMS client
#[derive(Debug, Parser)]
#[command(name = "every8d")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// EVERY8D account
    #[arg(short, long, global = true, env = "EVERY8D_USERNAME")]
    username: Option<String>,

    /// EVERY8D password
    #[arg(short, long, global = true, env = "EVERY8D_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// API base URL (must end with `/`)
    #[arg(long, global = true, env = "EVERY8D_BASE_URL")]
    base_url: Option<String>,

    /// Print responses as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show remaining account credit
    Credit,

    /// Query delivery status of a sent batch
    DeliveryStatus {
        /// Batch ID returned by send
        #[arg(long)]
        bid: String,

        /// Page number
        #[arg(long)]
        pno: Option<u32>,

        /// Message type of the batch
        #[arg(long = "type", value_enum, default_value_t = Kind::Sms)]
        kind: Kind,
    },

    /// Send an SMS
    Send(SendArgs),

    /// Send an MMS with an image attachment
    SendMms {
        #[command(flatten)]
        send: SendArgs,

        /// Base64-encoded image
        #[arg(long, conflicts_with = "attachment")]
        image: Option<String>,

        /// Image file to attach
        #[arg(long)]
        attachment: Option<PathBuf>,

        /// Image type (png, jpg, jpeg, gif); inferred from --attachment when omitted
        #[arg(long = "type")]
        file_type: Option<MmsFileType>,
    },

    /// Receive delivery reports on GET /callback
    Webhook {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Subject (not delivered to the handset)
    #[arg(long)]
    sb: Option<String>,

    /// Message content
    #[arg(long)]
    msg: String,

    /// Recipients, comma-separated
    #[arg(long)]
    dest: String,

    /// Validate recipients and send them in E.164 form (local numbers are Taiwanese)
    #[arg(long)]
    normalize: bool,

    /// Reservation time, yyyyMMddHHmmss
    #[arg(long)]
    st: Option<String>,

    /// Validity window in minutes
    #[arg(long)]
    retry_time: Option<u32>,

    /// Caller message number
    #[arg(long)]
    mr: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Sms,
    Mms,
}

impl From<Kind> for MessageKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Sms => MessageKind::Sms,
            Kind::Mms => MessageKind::Mms,
        }
    }
}

impl SendArgs {
    fn to_message(&self) -> Result<Message> {
        let options = SendOptions {
            subject: self.sb.clone().map(Subject::new),
            reservation_time: self.st.clone().map(ReservationTime::new).transpose()?,
            retry_time: self.retry_time.map(RetryMinutes::new),
            message_no: self.mr.clone().map(MessageNo::new).transpose()?,
        };
        let destination = if self.normalize {
            Destination::parse_normalized(&self.dest)?
        } else {
            Destination::parse_list(&self.dest)?
        };
        Ok(Message::new(
            destination,
            MessageContent::new(self.msg.clone())?,
            options,
        ))
    }
}

fn build_mms(
    send: &SendArgs,
    image: Option<String>,
    attachment: Option<PathBuf>,
    file_type: Option<MmsFileType>,
) -> Result<Mms> {
    let message = send.to_message()?;
    let (attachment, file_type) = match (image, attachment) {
        (Some(image), _) => {
            let file_type = file_type.context("--type is required with --image")?;
            (Attachment::new(image), file_type)
        }
        (None, Some(path)) => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_type = match file_type {
                Some(file_type) => file_type,
                None => MmsFileType::from_path(&path)?,
            };
            (Attachment::from_bytes(&bytes), file_type)
        }
        (None, None) => bail!("one of --image or --attachment is required"),
    };
    Ok(Mms::new(message, attachment, file_type))
}

impl Cli {
    fn client(&self) -> Result<Every8dClient> {
        let username = self
            .username
            .clone()
            .context("--username or EVERY8D_USERNAME is required")?;
        let password = self
            .password
            .clone()
            .context("--password or EVERY8D_PASSWORD is required")?;
        let credentials = Credentials::new(username, password)?;

        let mut builder = Every8dClient::builder(credentials);
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url.clone());
        }
        Ok(builder.build()?)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_send(response: &SendResponse) -> String {
    format!(
        "batch_id: {}\ncredit: {}\nsent: {}\ncost: {}\nunsent: {}",
        response.batch_id, response.credit, response.sent, response.cost, response.unsent
    )
}

fn format_delivery_status(response: &DeliveryStatusResponse) -> String {
    let mut lines = vec![format!("count: {}", response.count)];
    lines.extend(response.records.iter().map(|record| {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            record.name,
            record.mobile,
            record.send_time,
            record.cost,
            record.status,
            record.status.text()
        )
    }));
    lines.join("\n")
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Credit => {
            let credit = cli.client()?.get_credit().await?;
            if cli.json {
                print_json(&credit)?;
            } else {
                println!("{credit}");
            }
        }
        Commands::DeliveryStatus { bid, pno, kind } => {
            let mut query = DeliveryStatusQuery::new(BatchId::new(bid.clone())?);
            if let Some(pno) = pno {
                query = query.page(PageNo::new(*pno));
            }
            let response = cli
                .client()?
                .delivery_status((*kind).into(), query)
                .await?;
            if cli.json {
                print_json(&response)?;
            } else {
                println!("{}", format_delivery_status(&response));
            }
        }
        Commands::Send(send) => {
            let response = cli.client()?.send(send.to_message()?).await?;
            if cli.json {
                print_json(&response)?;
            } else {
                println!("{}", format_send(&response));
            }
        }
        Commands::SendMms {
            send,
            image,
            attachment,
            file_type,
        } => {
            let mms = build_mms(send, image.clone(), attachment.clone(), *file_type)?;
            let response = cli.client()?.send_mms(mms).await?;
            if cli.json {
                print_json(&response)?;
            } else {
                println!("{}", format_send(&response));
            }
        }
        Commands::Webhook { port } => webhook::serve(*port).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::try_init(LogLevel::from_verbosity(cli.verbose)).map_err(anyhow::Error::msg)?;
    run(cli).await
}
