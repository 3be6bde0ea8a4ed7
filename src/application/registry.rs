use crate::config::SalonProfile;
use crate::domain::ports::{DocumentStore, Versioned, Write, WriteBatch};
use crate::domain::salon::Salon;
use crate::error::Result;

/// Creates a salon with its stylists and service menu in one batch.
///
/// Fails with `Conflict` if any of the documents already exist, leaving the
/// stored salon untouched.
pub async fn register_salon(store: &dyn DocumentStore, profile: &SalonProfile) -> Result<Salon> {
    profile.validate()?;
    let salon = profile.to_salon();

    let mut batch = WriteBatch::new();
    batch.put(Write::Salon(Versioned::create(salon.clone())));
    for stylist in profile.to_stylists() {
        batch.put(Write::Stylist(Versioned::create(stylist)));
    }
    for service in profile.to_services() {
        batch.put(Write::Service(Versioned::create(service)));
    }
    store.commit(batch).await?;

    tracing::info!(
        salon = %salon.id,
        stylists = profile.stylists.len(),
        services = profile.services.len(),
        "salon registered"
    );
    Ok(salon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceProfile, StylistProfile};
    use crate::error::SalonError;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn profile() -> SalonProfile {
        SalonProfile {
            id: "s1".into(),
            name: "Shears".into(),
            address: "1 Main St".into(),
            average_service_time: Some(20),
            accepts_bookings: true,
            accepts_appointments: true,
            stylists: vec![StylistProfile {
                id: "maya".into(),
                name: "Maya".into(),
                active: true,
            }],
            services: vec![ServiceProfile {
                id: "cut".into(),
                name: "Haircut".into(),
                price: dec!(25.00),
                duration_min: 30,
            }],
        }
    }

    #[tokio::test]
    async fn test_register_creates_everything() {
        let store = InMemoryStore::new();
        let salon = register_salon(&store, &profile()).await.unwrap();
        assert_eq!(salon.average_service_time, Some(20));

        assert!(store.salon(&"s1".into()).await.unwrap().is_some());
        assert_eq!(store.stylists(&"s1".into()).await.unwrap().len(), 1);
        let service = store
            .service(&"s1".into(), &"cut".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(service.price, dec!(25.00));
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let store = InMemoryStore::new();
        register_salon(&store, &profile()).await.unwrap();

        let err = register_salon(&store, &profile()).await.unwrap_err();
        assert!(matches!(err, SalonError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_zero_minute_service_never_reaches_the_store() {
        let store = InMemoryStore::new();
        let mut profile = profile();
        profile.services.insert(
            0,
            ServiceProfile {
                id: "consult".into(),
                name: "Consultation".into(),
                price: dec!(0),
                duration_min: 0,
            },
        );

        let err = register_salon(&store, &profile).await.unwrap_err();
        assert!(matches!(err, SalonError::InvalidArgument(_)));
        assert!(store.salon(&"s1".into()).await.unwrap().is_none());
    }
}
