use oso::{Oso, PolarClass};

use crate::auth::User;
use crate::entities::{Bid, Journey};
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(User::get_polar_class())?;
    o.register_class(Bid::get_polar_class())?;
    o.register_class(Journey::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
fn journey(passenger_id: uuid::Uuid) -> Journey {
    use crate::entities::JourneyStatus;
    use chrono::{Duration, Utc};

    Journey::new(passenger_id, JourneyStatus::Open, Utc::now() + Duration::minutes(10))
}

#[cfg(test)]
fn bid(journey_id: uuid::Uuid, driver_id: uuid::Uuid) -> Bid {
    use crate::entities::NewBid;
    use chrono::Utc;
    use rust_decimal::Decimal;

    let new_bid = NewBid {
        journey_id,
        driver_id,
        amount: Decimal::new(3500, 0),
        note: None,
    };

    Bid::new(new_bid, Utc::now()).unwrap()
}

#[test]
fn driver_withdraw_own_bid_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let driver = User::new(Uuid::new_v4());
    let other_driver = User::new(Uuid::new_v4());

    let journey = journey(Uuid::new_v4());
    let bid = bid(journey.id, driver.id);

    let result = authorizor.is_allowed(driver.clone(), "withdraw", bid.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(other_driver.clone(), "withdraw", bid.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "accept", journey.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn passenger_accept_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger = User::new(Uuid::new_v4());
    let stranger = User::new(Uuid::new_v4());

    let journey = journey(passenger.id);

    let result = authorizor.is_allowed(passenger.clone(), "accept", journey.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "accept", journey.clone());
    assert_eq!(result.unwrap(), false);

    // the system role does not stand in for the passenger
    let result = authorizor.is_allowed(User::new_system_user(), "accept", journey.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn system_expire_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let result = authorizor.is_allowed(User::new_system_user(), "expire", "bids");
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(User::new(Uuid::new_v4()), "expire", "bids");
    assert_eq!(result.unwrap(), false);
}
