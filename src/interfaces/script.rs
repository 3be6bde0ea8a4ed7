use super::csv::command_reader::{Command, Op, ScriptLine};
use super::csv::result_writer::CommandOutcome;
use crate::application::engine::SalonEngine;
use crate::application::scheduler::BookingRequest;
use crate::application::Caller;
use crate::domain::appointment::StylistChoice;
use crate::domain::ids::{AppointmentId, CheckInId, SalonId, ServiceId, StylistId, UserId};
use crate::domain::ports::ManualClock;
use crate::error::{Result, SalonError};
use std::collections::HashMap;
use std::sync::Arc;

/// Executes command scripts against an engine, one row at a time.
///
/// Ids minted by the core are bound to the alias in the row's `target`
/// column, so later rows can refer to "t1" instead of a UUID. A booking of
/// several services binds `alias` to the first appointment and `alias.N` to
/// the N-th.
pub struct ScriptRunner<'a> {
    engine: &'a SalonEngine,
    clock: Arc<ManualClock>,
    tickets: HashMap<String, CheckInId>,
    appointments: HashMap<String, AppointmentId>,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(engine: &'a SalonEngine, clock: Arc<ManualClock>) -> Self {
        Self {
            engine,
            clock,
            tickets: HashMap::new(),
            appointments: HashMap::new(),
        }
    }

    pub async fn execute(&mut self, script_line: ScriptLine) -> CommandOutcome {
        let ScriptLine { line, command } = script_line;
        let op = command.op;
        if let Some(at) = command.at {
            self.clock.set(at);
        }

        match self.dispatch(command).await {
            Ok(detail) => CommandOutcome::ok(line, op, detail),
            Err(err) => CommandOutcome::failed(line, op, &err),
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<String> {
        let caller = match command.actor.as_deref() {
            Some(actor) => Caller::User(UserId::from(actor)),
            None => Caller::Anonymous,
        };

        match command.op {
            Op::Checkin => {
                let salon = required_salon(&command)?;
                let receipt = self.engine.queue.check_in(&caller, &salon).await?;
                if let Some(alias) = &command.target {
                    self.tickets.insert(alias.clone(), receipt.check_in_id);
                }
                Ok(format!(
                    "ticket={} position={} wait={}",
                    receipt.ticket_number, receipt.queue_position, receipt.estimated_wait_time
                ))
            }
            Op::Checkout => {
                let salon = required_salon(&command)?;
                let ticket = self.ticket(command.target.as_deref())?;
                let receipt = self.engine.queue.check_out(&caller, &salon, &ticket).await?;
                Ok(if receipt.already_closed {
                    format!("queue={} already_closed", receipt.queue_count)
                } else {
                    format!("queue={}", receipt.queue_count)
                })
            }
            Op::Adjust => {
                caller.user_id()?;
                let salon = required_salon(&command)?;
                let delta: i32 = parse_value(&command, "delta")?;
                let count = self.engine.queue.adjust_queue(&caller, &salon, delta).await?;
                Ok(format!("queue={count}"))
            }
            Op::Duty => {
                caller.user_id()?;
                let salon = required_salon(&command)?;
                let stylist = StylistId::from(required(command.target.as_deref(), "target")?);
                let on_duty = parse_duty(required(command.value.as_deref(), "value")?)?;
                let echoed = self
                    .engine
                    .staff
                    .toggle_duty(&caller, &salon, &stylist, on_duty)
                    .await?;
                Ok(format!("on_duty={echoed}"))
            }
            Op::Rate => {
                caller.user_id()?;
                let salon = required_salon(&command)?;
                let score: i64 = parse_value(&command, "rating")?;
                let rating_id = self
                    .engine
                    .staff
                    .submit_rating(&caller, &salon, score, command.target.clone())
                    .await?;
                Ok(format!("rating={rating_id}"))
            }
            Op::Book => {
                let request = BookingRequest {
                    salon_id: required_salon(&command)?,
                    service_ids: command
                        .services
                        .as_deref()
                        .unwrap_or_default()
                        .split(';')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(ServiceId::from)
                        .collect(),
                    date: command
                        .date
                        .ok_or_else(|| missing("date"))?,
                    time: command
                        .time
                        .ok_or_else(|| missing("time"))?,
                    stylist: StylistChoice::parse(command.value.as_deref()),
                };
                let booked = self.engine.appointments.book(&caller, &request).await?;
                if let Some(alias) = &command.target {
                    for (n, appointment) in booked.iter().enumerate() {
                        if n == 0 {
                            self.appointments.insert(alias.clone(), appointment.id);
                        }
                        self.appointments
                            .insert(format!("{alias}.{}", n + 1), appointment.id);
                    }
                }
                let slots: Vec<String> = booked
                    .iter()
                    .map(|a| format!("{}@{}", a.service_id, a.time.format("%H:%M")))
                    .collect();
                Ok(format!("booked={}", slots.join(";")))
            }
            Op::Cancel => {
                let id = self.appointment(command.target.as_deref())?;
                let changed = self.engine.appointments.cancel(&id).await?;
                Ok(format!("changed={changed}"))
            }
            Op::Complete => {
                let id = self.appointment(command.target.as_deref())?;
                let user_id = caller.user_id()?;
                let receipt = self.engine.appointments.complete(&id, user_id).await?;
                Ok(match receipt.points_awarded {
                    Some(points) => format!("changed={} points={points}", receipt.changed),
                    None => format!("changed={}", receipt.changed),
                })
            }
            Op::Sweep => {
                let report = self.engine.sweep.run().await?;
                let mut detail = format!("closed={}", report.total_closed());
                for (salon, closed) in &report.closed {
                    detail.push_str(&format!(" {salon}={closed}"));
                }
                if !report.failed.is_empty() {
                    let failed: Vec<&str> = report.failed.iter().map(SalonId::as_str).collect();
                    detail.push_str(&format!(" failed={}", failed.join(";")));
                }
                Ok(detail)
            }
            Op::Snapshot => {
                let snapshot = self.engine.snapshot(&required_salon(&command)?).await?;
                let salon = &snapshot.salon;
                let rating = salon
                    .average_rating()
                    .map_or_else(|| "-".to_string(), |avg| format!("{avg:.2}"));
                Ok(format!(
                    "queue={} waiting={} on_duty={} ticket={} rating={rating}",
                    salon.queue_count,
                    snapshot.waiting.len(),
                    salon.on_duty_count,
                    salon.daily_queue_counter,
                ))
            }
        }
    }

    fn ticket(&self, target: Option<&str>) -> Result<CheckInId> {
        let target = required(target, "target")?;
        self.tickets
            .get(target)
            .copied()
            .or_else(|| CheckInId::parse(target))
            .ok_or_else(|| SalonError::not_found("check-in", target))
    }

    fn appointment(&self, target: Option<&str>) -> Result<AppointmentId> {
        let target = required(target, "target")?;
        self.appointments
            .get(target)
            .copied()
            .or_else(|| AppointmentId::parse(target))
            .ok_or_else(|| SalonError::not_found("appointment", target))
    }
}

fn missing(column: &str) -> SalonError {
    SalonError::InvalidArgument(format!("{column} is required"))
}

fn required<'v>(value: Option<&'v str>, column: &str) -> Result<&'v str> {
    value.ok_or_else(|| missing(column))
}

fn required_salon(command: &Command) -> Result<SalonId> {
    required(command.salon.as_deref(), "salon").map(SalonId::from)
}

fn parse_value<T: std::str::FromStr>(command: &Command, what: &str) -> Result<T> {
    let raw = required(command.value.as_deref(), "value")?;
    raw.trim_start_matches('+')
        .parse()
        .map_err(|_| SalonError::InvalidArgument(format!("{what} must be an integer, got {raw}")))
}

fn parse_duty(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(SalonError::InvalidArgument(format!(
            "duty must be on or off, got {raw}"
        ))),
    }
}
