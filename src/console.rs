// src/console.rs

//! An interactive console that evaluates statements against an in-process
//! instance, without a server or socket.

use crate::config::Config;
use crate::core::SigmaError;
use crate::core::engine;
use crate::core::format;
use crate::core::instance::Instance;
use crate::core::protocol::{QueryCodec, QueryResult};
use crate::core::query::Statement;
use anyhow::{Context, Result};
use bytes::BytesMut;
use std::io::IsTerminal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::codec::Decoder;
use tracing::debug;

const PROMPT: &str = "sigma> ";
const CONTINUATION_PROMPT: &str = "   ...> ";

const HELP: &str = "\
Statements end with ';' and may span several lines.

  CREATE TABLE name (col INT|TEXT|BOOL, ...);
  DROP TABLE name;
  INSERT INTO name [(col, ...)] VALUES (value, ...), ...;
  SELECT * | col, ... FROM name [WHERE col op value [AND ...]];
  DELETE FROM name [WHERE col op value [AND ...]];
  SHOW TABLES;
  DESCRIBE name;

Meta commands:
  .help     show this text
  .tables   list relations
  .quit     leave the console
";

/// Opens the configured instance and runs the console on stdin and stdout.
pub async fn run(config: &Config) -> Result<()> {
    let instance = Instance::open_optional(config.log_file.as_deref(), config.log_fsync)
        .await
        .context("Failed to open the instance")?;

    let interactive = std::io::stdin().is_terminal();
    let mut stdout = tokio::io::stdout();
    if interactive {
        let banner = format!(
            "SigmaDB {} console. Type .help for help.\n",
            env!("SIGMADB_BUILD_VERSION")
        );
        stdout.write_all(banner.as_bytes()).await?;
    }

    Console::new(instance, stdout, config.limits.max_buffered_bytes)
        .with_prompt(interactive)
        .run(BufReader::new(tokio::io::stdin()))
        .await
        .context("Console failed")
}

/// Line-oriented read-evaluate-print loop.
pub struct Console<W> {
    instance: Instance,
    codec: QueryCodec,
    max_buffered_bytes: usize,
    buffer: BytesMut,
    output: W,
    prompt: bool,
}

impl<W: AsyncWrite + Unpin> Console<W> {
    pub fn new(instance: Instance, output: W, max_buffered_bytes: usize) -> Self {
        Self {
            instance,
            codec: QueryCodec::new(max_buffered_bytes),
            max_buffered_bytes,
            buffer: BytesMut::new(),
            output,
            prompt: false,
        }
    }

    /// Whether to print prompts before each line.
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    /// Reads lines until end of input or `.quit`, then closes the instance.
    pub async fn run<R>(mut self, input: R) -> Result<(), SigmaError>
    where
        R: AsyncBufRead + Unpin,
    {
        let result = self.read_eval_loop(input).await;
        let closed = self.instance.close().await;
        self.output.flush().await?;
        result.and(closed)
    }

    async fn read_eval_loop<R>(&mut self, mut input: R) -> Result<(), SigmaError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        loop {
            if self.prompt {
                let prompt = if self.buffer.iter().all(u8::is_ascii_whitespace) {
                    PROMPT
                } else {
                    CONTINUATION_PROMPT
                };
                self.output.write_all(prompt.as_bytes()).await?;
                self.output.flush().await?;
            }

            line.clear();
            if input.read_until(b'\n', &mut line).await? == 0 {
                while let Some(item) = self.codec.decode_eof(&mut self.buffer)? {
                    self.handle(item).await?;
                }
                return Ok(());
            }

            if self.buffer.is_empty() {
                let trimmed = String::from_utf8_lossy(&line);
                let trimmed = trimmed.trim();
                if trimmed.starts_with('.') {
                    if !self.meta_command(trimmed).await? {
                        return Ok(());
                    }
                    continue;
                }
            }

            self.buffer.extend_from_slice(&line);
            loop {
                match self.codec.decode(&mut self.buffer) {
                    Ok(Some(item)) => self.handle(item).await?,
                    Ok(None) => break,
                    Err(e) => {
                        self.buffer.clear();
                        self.codec = QueryCodec::new(self.max_buffered_bytes);
                        self.print(&QueryResult::from(e)).await?;
                        break;
                    }
                }
            }
        }
    }

    async fn handle(&mut self, item: Result<Statement, SigmaError>) -> Result<(), SigmaError> {
        let result = match item {
            Ok(statement) => {
                debug!("console: {}", statement.name());
                engine::evaluate(statement, &mut self.instance).await
            }
            Err(e) => e.into(),
        };
        self.print(&result).await
    }

    /// Runs a meta command. Returns false when the console should stop.
    async fn meta_command(&mut self, command: &str) -> Result<bool, SigmaError> {
        match command {
            ".quit" | ".exit" => return Ok(false),
            ".help" => self.output.write_all(HELP.as_bytes()).await?,
            ".tables" => {
                let result = engine::evaluate(Statement::ShowTables, &mut self.instance).await;
                self.print(&result).await?;
            }
            other => {
                let result = QueryResult::Error(format!(
                    "unknown command '{other}'; type .help for help"
                ));
                self.print(&result).await?;
            }
        }
        Ok(true)
    }

    async fn print(&mut self, result: &QueryResult) -> Result<(), SigmaError> {
        self.output.write_all(format::render(result).as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}
