use super::{Caller, Context, log_failure, retry_on_conflict};
use crate::domain::appointment::{Appointment, AppointmentStatus, StylistChoice};
use crate::domain::events::DomainEvent;
use crate::domain::ids::{AppointmentId, SalonId, ServiceId, UserId};
use crate::domain::ports::{Versioned, Write, WriteBatch};
use crate::domain::queue::User;
use crate::domain::rules::{self, Rejection, Transition};
use crate::domain::salon::Service;
use crate::error::{Result, SalonError};
use chrono::{NaiveDate, NaiveTime, TimeDelta};

/// A request to book one or more services.
///
/// `date` and `time` are wall-clock values in UTC. Slots earlier than the
/// clock's current UTC instant are refused, so callers in other time zones
/// must convert before building the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub salon_id: SalonId,
    /// Booked back-to-back in this order, starting at `time`.
    pub service_ids: Vec<ServiceId>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub stylist: StylistChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReceipt {
    /// False when the appointment was already completed.
    pub changed: bool,
    /// `None` if no award was attempted or the award failed.
    pub points_awarded: Option<u32>,
}

/// Timed appointments: booking against per-slot availability and the
/// `booked -> completed | cancelled` lifecycle.
///
/// Slot checks are check-then-act. Two requests racing for the same slot
/// can both succeed because creating an appointment has no precondition on
/// the appointments next to it.
pub struct AppointmentScheduler {
    ctx: Context,
    loyalty_points: u32,
    contention_retries: u32,
}

impl AppointmentScheduler {
    pub fn new(ctx: Context, loyalty_points: u32, contention_retries: u32) -> Self {
        Self {
            ctx,
            loyalty_points,
            contention_retries,
        }
    }

    /// Books every requested service or none of them.
    pub async fn book(&self, caller: &Caller, request: &BookingRequest) -> Result<Vec<Appointment>> {
        let user_id = caller.user_id()?;
        if request.service_ids.is_empty() {
            let err = SalonError::InvalidArgument("at least one service is required".into());
            log_failure("book", &err);
            return Err(err);
        }

        let appointments = retry_on_conflict(self.contention_retries, "book", move || {
            self.try_book(user_id, request)
        })
        .await
        .inspect_err(|err| log_failure("book", err))?;

        tracing::info!(
            salon = %request.salon_id,
            user = %user_id,
            date = %request.date,
            time = %request.time,
            stylist = %request.stylist,
            count = appointments.len(),
            "appointments booked"
        );
        self.ctx
            .emit(DomainEvent::AppointmentsConfirmed {
                appointments: appointments.clone(),
            })
            .await;
        Ok(appointments)
    }

    async fn try_book(&self, user_id: &UserId, request: &BookingRequest) -> Result<Vec<Appointment>> {
        let store = &self.ctx.store;
        let salon_id = &request.salon_id;
        let salon = store
            .salon(salon_id)
            .await?
            .ok_or_else(|| SalonError::not_found("salon", salon_id))?;
        if !salon.accepts_appointments {
            return Err(Rejection::AppointmentsDisabled.into());
        }

        let now = self.ctx.clock.now();
        if request.date.and_time(request.time).and_utc() < now {
            return Err(SalonError::InvalidArgument(format!(
                "{} {} is in the past",
                request.date, request.time
            )));
        }

        let stylists = store.stylists(salon_id).await?;
        if let StylistChoice::Stylist(id) = &request.stylist {
            match stylists.iter().find(|s| &s.id == id) {
                None => return Err(SalonError::not_found("stylist", id)),
                Some(s) if !s.active => {
                    return Err(SalonError::InvalidArgument(format!(
                        "stylist {id} is not taking appointments"
                    )));
                }
                Some(_) => {}
            }
        }
        let total_active = stylists.iter().filter(|s| s.active).count();

        let mut services: Vec<Service> = Vec::with_capacity(request.service_ids.len());
        for id in &request.service_ids {
            let service = store
                .service(salon_id, id)
                .await?
                .ok_or_else(|| SalonError::not_found("service", id))?;
            if service.duration_min == 0 {
                return Err(SalonError::InvalidArgument(format!(
                    "service {id} has no duration"
                )));
            }
            services.push(service.into_inner());
        }

        let mut on_books: Vec<Appointment> = store
            .appointments_on(salon_id, request.date)
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        let existing = on_books.len();

        let mut start = Some(request.time);
        for service in services {
            let time = start.ok_or_else(|| {
                SalonError::InvalidArgument("services would run past midnight".into())
            })?;
            rules::decide_appointment_slot(&on_books, &request.stylist, time, total_active)?;
            tracing::debug!(salon = %salon_id, service = %service.id, %time, "slot available");

            let (next, wrapped) =
                time.overflowing_add_signed(TimeDelta::minutes(i64::from(service.duration_min)));
            start = (wrapped == 0).then_some(next);

            on_books.push(Appointment {
                id: AppointmentId::generate(),
                salon_id: salon_id.clone(),
                salon_name: salon.name.clone(),
                salon_address: salon.address.clone(),
                user_id: user_id.clone(),
                service_id: service.id,
                service_name: service.name,
                stylist: request.stylist.clone(),
                date: request.date,
                time,
                status: AppointmentStatus::Booked,
                price: service.price,
                duration_min: service.duration_min,
                created_at: now,
                updated_at: now,
            });
        }

        let booked = on_books.split_off(existing);
        let mut batch = WriteBatch::new();
        for appointment in &booked {
            batch.put(Write::Appointment(Versioned::create(appointment.clone())));
        }
        store.commit(batch).await?;
        Ok(booked)
    }

    /// Returns whether anything changed; cancelling twice is a no-op.
    pub async fn cancel(&self, id: &AppointmentId) -> Result<bool> {
        let (transition, appointment) = self
            .transition(id, AppointmentStatus::Cancelled)
            .await
            .inspect_err(|err| log_failure("cancel", err))?;
        if transition == Transition::NoOp {
            return Ok(false);
        }

        tracing::info!(appointment = %id, salon = %appointment.salon_id, "appointment cancelled");
        self.ctx
            .emit(DomainEvent::AppointmentCancelled { appointment })
            .await;
        Ok(true)
    }

    /// Completes the appointment, then credits `user_id` with loyalty points.
    /// The credit is best-effort and never undoes the completion.
    pub async fn complete(&self, id: &AppointmentId, user_id: &UserId) -> Result<CompletionReceipt> {
        let (transition, appointment) = self
            .transition(id, AppointmentStatus::Completed)
            .await
            .inspect_err(|err| log_failure("complete", err))?;
        if transition == Transition::NoOp {
            return Ok(CompletionReceipt {
                changed: false,
                points_awarded: None,
            });
        }

        tracing::info!(appointment = %id, salon = %appointment.salon_id, "appointment completed");
        let points_awarded = match self.award_points(user_id).await {
            Ok(total) => {
                tracing::debug!(user = %user_id, points = self.loyalty_points, total, "loyalty points awarded");
                Some(self.loyalty_points)
            }
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "failed to award loyalty points");
                None
            }
        };

        self.ctx
            .emit(DomainEvent::AppointmentCompleted {
                appointment,
                points_awarded,
            })
            .await;
        Ok(CompletionReceipt {
            changed: true,
            points_awarded,
        })
    }

    async fn transition(
        &self,
        id: &AppointmentId,
        target: AppointmentStatus,
    ) -> Result<(Transition, Appointment)> {
        retry_on_conflict(self.contention_retries, "appointment_transition", move || {
            self.try_transition(id, target)
        })
        .await
    }

    async fn try_transition(
        &self,
        id: &AppointmentId,
        target: AppointmentStatus,
    ) -> Result<(Transition, Appointment)> {
        let store = &self.ctx.store;
        let mut appointment = store
            .appointment(id)
            .await?
            .ok_or_else(|| SalonError::not_found("appointment", id))?;

        let transition = rules::decide_appointment_transition(appointment.status, target)?;
        if transition == Transition::Apply {
            appointment.status = target;
            appointment.updated_at = self.ctx.clock.now();
            let mut batch = WriteBatch::new();
            batch.put(Write::Appointment(appointment.clone()));
            store.commit(batch).await?;
        }
        Ok((transition, appointment.into_inner()))
    }

    /// Returns the user's new balance.
    async fn award_points(&self, user_id: &UserId) -> Result<u32> {
        retry_on_conflict(self.contention_retries, "award_points", move || async move {
            let store = &self.ctx.store;
            let mut user = store
                .user(user_id)
                .await?
                .unwrap_or_else(|| Versioned::create(User::new(user_id.clone())));
            user.loyalty_points = user.loyalty_points.saturating_add(self.loyalty_points);
            let total = user.loyalty_points;

            let mut batch = WriteBatch::new();
            batch.put(Write::User(user));
            store.commit(batch).await?;
            Ok(total)
        })
        .await
    }
}
