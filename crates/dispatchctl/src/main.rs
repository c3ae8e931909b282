use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dispatch_core::api::{
    AssignRequest, CommandRequest, CoordinateRequest, JoinAgencyRequest, LeaveRequest,
    RegisterTeamRequest, ReportRequest, UserStatusRequest,
};
use dispatch_core::model::{AgencyId, AgencyType, TeamStatus};
use dispatch_core::Coordinate;
use serde::Serialize;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "dispatchctl", about = "Talk to a running dispatch daemon")]
struct Args {
    /// Base URL of the daemon.
    #[arg(long, env = "DISPATCH_DAEMON", default_value = "http://127.0.0.1:7878")]
    daemon: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Report an emergency and notify nearby agencies.
    Report {
        #[arg(long = "type")]
        emergency_type: String,
        #[arg(long)]
        location: String,
        /// Responder type; derived from --type when omitted.
        #[arg(long)]
        response: Option<String>,
        #[arg(long)]
        service: bool,
    },
    Alerts {
        #[command(subcommand)]
        alerts: AlertCmd,
    },
    Teams {
        #[command(subcommand)]
        teams: TeamCmd,
    },
    /// Show or change the operator's status.
    Status { status: Option<String> },
    Session {
        #[command(subcommand)]
        session: SessionCmd,
    },
    Agencies {
        #[command(subcommand)]
        agencies: AgencyCmd,
    },
    /// Run a free-text operator command, e.g. "fire in Mumbai".
    Say { text: Vec<String> },
}

#[derive(Subcommand, Debug)]
enum AlertCmd {
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    Get {
        id: String,
    },
    Assign {
        id: String,
        #[arg(long)]
        team: String,
    },
    Unassign {
        id: String,
    },
    Resolve {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum TeamCmd {
    List,
    Register {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        team_type: AgencyType,
        #[arg(long)]
        busy: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCmd {
    Current,
    History,
    Join {
        #[arg(long)]
        agency: AgencyId,
        #[arg(long)]
        disaster: String,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
    },
    /// Join the closest agencies around a named place.
    Coordinate {
        location: String,
        #[arg(long, default_value = "coordination")]
        disaster: String,
    },
    Leave {
        session_id: String,
        #[arg(long)]
        agency: AgencyId,
    },
    End {
        session_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum AgencyCmd {
    List,
    Get {
        id: AgencyId,
    },
    Nearby {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long = "type")]
        agency_type: Option<AgencyType>,
        #[arg(long)]
        radius: Option<f64>,
    },
    Reload,
}

struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        read(resp).await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> anyhow::Result<Value> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        read(resp).await
    }

    async fn put<B: Serialize>(&self, path: &str, body: &B) -> anyhow::Result<Value> {
        let resp = self
            .http
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("PUT {path}"))?;
        read(resp).await
    }
}

/// Decodes the body; non-2xx answers become errors carrying the daemon's
/// message.
async fn read(resp: reqwest::Response) -> anyhow::Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let detail = body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("no details");
        bail!("daemon answered {status}: {detail}");
    }
    Ok(body)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = Client {
        http: reqwest::Client::new(),
        base: args.daemon,
    };

    let out = match args.cmd {
        Cmd::Report {
            emergency_type,
            location,
            response,
            service,
        } => {
            let req = ReportRequest {
                emergency_type,
                response_type: response,
                location,
                is_service_request: service,
            };
            client.post("/v1/alerts", &req).await?
        }
        Cmd::Alerts { alerts } => match alerts {
            AlertCmd::List { status, location } => {
                let mut query = Vec::new();
                if let Some(s) = status {
                    query.push(("status", s));
                }
                if let Some(l) = location {
                    query.push(("location", l));
                }
                client.get("/v1/alerts", &query).await?
            }
            AlertCmd::Get { id } => client.get(&format!("/v1/alerts/{id}"), &[]).await?,
            AlertCmd::Assign { id, team } => {
                client
                    .post(&format!("/v1/alerts/{id}/assign"), &AssignRequest { team })
                    .await?
            }
            AlertCmd::Unassign { id } => {
                client
                    .post(&format!("/v1/alerts/{id}/unassign"), &Value::Null)
                    .await?
            }
            AlertCmd::Resolve { id } => {
                client
                    .post(&format!("/v1/alerts/{id}/resolve"), &Value::Null)
                    .await?
            }
        },
        Cmd::Teams { teams } => match teams {
            TeamCmd::List => client.get("/v1/teams", &[]).await?,
            TeamCmd::Register {
                name,
                team_type,
                busy,
            } => {
                let req = RegisterTeamRequest {
                    name,
                    team_type,
                    status: if busy {
                        TeamStatus::Busy
                    } else {
                        TeamStatus::Available
                    },
                };
                client.post("/v1/teams", &req).await?
            }
        },
        Cmd::Status { status } => match status {
            Some(status) => {
                client
                    .put("/v1/user/status", &UserStatusRequest { status })
                    .await?
            }
            None => client.get("/v1/user/status", &[]).await?,
        },
        Cmd::Session { session } => match session {
            SessionCmd::Current => client.get("/v1/sessions/current", &[]).await?,
            SessionCmd::History => client.get("/v1/sessions/history", &[]).await?,
            SessionCmd::Join {
                agency,
                disaster,
                lat,
                lng,
            } => {
                let req = JoinAgencyRequest {
                    agency_id: agency,
                    disaster_type: disaster,
                    location: Coordinate::new(lat, lng),
                };
                client.post("/v1/sessions/join", &req).await?
            }
            SessionCmd::Coordinate { location, disaster } => {
                let req = CoordinateRequest {
                    location,
                    disaster_type: disaster,
                };
                client.post("/v1/sessions/coordinate", &req).await?
            }
            SessionCmd::Leave { session_id, agency } => {
                client
                    .post(
                        &format!("/v1/sessions/{session_id}/leave"),
                        &LeaveRequest { agency_id: agency },
                    )
                    .await?
            }
            SessionCmd::End { session_id } => {
                client
                    .post(&format!("/v1/sessions/{session_id}/end"), &Value::Null)
                    .await?
            }
        },
        Cmd::Agencies { agencies } => match agencies {
            AgencyCmd::List => client.get("/v1/agencies", &[]).await?,
            AgencyCmd::Get { id } => client.get(&format!("/v1/agencies/{id}"), &[]).await?,
            AgencyCmd::Nearby {
                lat,
                lng,
                agency_type,
                radius,
            } => {
                let mut query = vec![("lat", lat.to_string()), ("lng", lng.to_string())];
                if let Some(t) = agency_type {
                    query.push(("type", t.as_str().to_string()));
                }
                if let Some(r) = radius {
                    query.push(("radius", r.to_string()));
                }
                client.get("/v1/agencies/nearby", &query).await?
            }
            AgencyCmd::Reload => client.post("/v1/agencies/reload", &Value::Null).await?,
        },
        Cmd::Say { text } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                bail!("nothing to say");
            }
            client.post("/v1/commands", &CommandRequest { text }).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
