//! One subprocess per validation run: feed the script, capture the transcript.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

use crate::core::config::Config;
use crate::core::errors::{Result, SuvError};
use crate::script::builder::TrialScript;
use crate::session::program::resolve_program;

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long pipe threads may lag behind child exit.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Anything that can turn a script into a captured transcript.
pub trait TranscriptSource {
    /// Human-readable identity of the source, for logs and reports.
    fn describe(&self) -> String;

    /// Run the whole script in one session and return its output.
    fn capture(&self, script: &TrialScript) -> Result<SessionTranscript>;
}

/// Output of one completed session.
#[derive(Debug, Clone, Default)]
pub struct SessionTranscript {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    /// The program closed stdin before consuming the whole script.
    pub stdin_truncated: bool,
}

/// Runs `<program> -v <verbosity>` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessSession {
    program: PathBuf,
    verbosity: u8,
    timeout: Duration,
    allow_nonzero_exit: bool,
}

impl ProcessSession {
    /// Resolve the program up front so a missing binary fails before any
    /// script is built.
    pub fn new(program: &Path, verbosity: u8, timeout: Duration) -> Result<Self> {
        Ok(Self {
            program: resolve_program(program)?,
            verbosity,
            timeout,
            allow_nonzero_exit: false,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(
            Self::new(
                &config.program.path,
                config.program.verbosity,
                Duration::from_secs(config.session.timeout_secs),
            )?
            .allow_nonzero_exit(config.session.allow_nonzero_exit),
        )
    }

    #[must_use]
    pub fn allow_nonzero_exit(mut self, allow: bool) -> Self {
        self.allow_nonzero_exit = allow;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn wait_with_deadline(&self, child: &mut Child, started: Instant) -> Result<ExitStatus> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(SuvError::SessionTimeout {
                            timeout_secs: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(SuvError::SessionIo {
                        stream: "wait",
                        details: e.to_string(),
                    });
                }
            }
        }
    }

    fn check_status(&self, status: ExitStatus) -> Result<Option<i32>> {
        match status.code() {
            None => Err(SuvError::SessionCrashed {
                status: status.to_string(),
            }),
            Some(0) => Ok(Some(0)),
            Some(code) if self.allow_nonzero_exit => Ok(Some(code)),
            Some(code) => Err(SuvError::SessionExit { code }),
        }
    }
}

impl TranscriptSource for ProcessSession {
    fn describe(&self) -> String {
        format!("{} -v {}", self.program.display(), self.verbosity)
    }

    fn capture(&self, script: &TrialScript) -> Result<SessionTranscript> {
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(self.verbosity.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SuvError::SessionSpawn {
                program: self.program.clone(),
                source,
            })?;

        let (tx, rx) = bounded::<PipeResult>(3);
        if let Some(stdin) = child.stdin.take() {
            spawn_feeder(stdin, script.as_bytes().to_vec(), tx.clone());
        } else {
            let _ = tx.send(PipeResult::Fed(Ok(())));
        }
        spawn_drain(child.stdout.take(), Stream::Stdout, tx.clone());
        spawn_drain(child.stderr.take(), Stream::Stderr, tx);

        let status = self.wait_with_deadline(&mut child, started)?;

        let mut transcript = SessionTranscript::default();
        for _ in 0..3 {
            match rx.recv_timeout(DRAIN_GRACE) {
                Ok(PipeResult::Fed(Ok(()))) => {}
                Ok(PipeResult::Fed(Err(e))) if e.kind() == ErrorKind::BrokenPipe => {
                    transcript.stdin_truncated = true;
                }
                Ok(PipeResult::Fed(Err(e))) => {
                    return Err(SuvError::SessionIo {
                        stream: "stdin",
                        details: e.to_string(),
                    });
                }
                Ok(PipeResult::Drained(stream, Ok(bytes))) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    match stream {
                        Stream::Stdout => transcript.stdout = text,
                        Stream::Stderr => transcript.stderr = text,
                    }
                }
                Ok(PipeResult::Drained(stream, Err(e))) => {
                    return Err(SuvError::SessionIo {
                        stream: stream.as_str(),
                        details: e.to_string(),
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SuvError::SessionIo {
                        stream: "stdout",
                        details: format!(
                            "output pipe still open {}s after program exit",
                            DRAIN_GRACE.as_secs()
                        ),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        transcript.exit_code = self.check_status(status)?;
        transcript.elapsed = started.elapsed();
        Ok(transcript)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

enum PipeResult {
    Fed(std::io::Result<()>),
    Drained(Stream, std::io::Result<Vec<u8>>),
}

fn spawn_feeder(mut stdin: std::process::ChildStdin, input: Vec<u8>, tx: Sender<PipeResult>) {
    thread::spawn(move || {
        let result = stdin.write_all(&input).and_then(|()| stdin.flush());
        drop(stdin);
        let _ = tx.send(PipeResult::Fed(result));
    });
}

fn spawn_drain<R>(pipe: Option<R>, stream: Stream, tx: Sender<PipeResult>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(PipeResult::Drained(stream, result));
    });
}
