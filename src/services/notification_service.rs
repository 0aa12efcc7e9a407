//! Plain-text notification emails.
//!
//! Builders only; sending goes through [`crate::infrastructure::mailer::deliver`].

use crate::infrastructure::mailer::EmailMessage;
use crate::models::{
    abstract_submission, conference, contact_message, membership, membership_plan,
    newsletter_subscriber, payment, user,
};

const SIGNATURE: &str = "\n\n-- \nThe SocietyHub secretariat";

fn greeting(user: &user::Model) -> String {
    if user.first_name.trim().is_empty() {
        "Hello,".to_string()
    } else {
        format!("Dear {},", user.first_name.trim())
    }
}

pub fn abstract_submitted(user: &user::Model, item: &abstract_submission::Model) -> EmailMessage {
    EmailMessage::new(
        &user.email,
        format!("Abstract received: {}", item.title),
        format!(
            "{}\n\nWe have received your abstract \"{}\" (reference #{}). \
             You will be notified once the review committee has assessed it.{}",
            greeting(user),
            item.title,
            item.id,
            SIGNATURE
        ),
    )
}

pub fn abstract_status_changed(
    user: &user::Model,
    item: &abstract_submission::Model,
) -> EmailMessage {
    let status = item.status.replace('_', " ");
    EmailMessage::new(
        &user.email,
        format!("Abstract {}: {}", status, item.title),
        format!(
            "{}\n\nThe status of your abstract \"{}\" (reference #{}) is now: {}.{}",
            greeting(user),
            item.title,
            item.id,
            status,
            SIGNATURE
        ),
    )
}

pub fn registration_confirmed(user: &user::Model, item: &conference::Model) -> EmailMessage {
    let place = [item.venue.as_deref(), item.city.as_deref(), item.country.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let mut body = format!(
        "{}\n\nYour registration for \"{}\" is confirmed.\nDates: {} to {}",
        greeting(user),
        item.title,
        item.start_date,
        item.end_date
    );
    if !place.is_empty() {
        body.push_str(&format!("\nVenue: {}", place));
    }
    body.push_str(SIGNATURE);

    EmailMessage::new(&user.email, format!("Registration confirmed: {}", item.title), body)
}

pub fn payment_receipt(
    user: &user::Model,
    plan: &membership_plan::Model,
    paid: &payment::Model,
    valid: &membership::Model,
) -> EmailMessage {
    EmailMessage::new(
        &user.email,
        "Membership payment received",
        format!(
            "{}\n\nThank you for your payment of {}.{:02} {} for the {} plan.\n\
             Reference: {}\nYour membership is valid until {}.{}",
            greeting(user),
            paid.amount_cents / 100,
            paid.amount_cents % 100,
            paid.currency,
            plan.name,
            paid.reference,
            valid.valid_until,
            SIGNATURE
        ),
    )
}

pub fn newsletter_welcome(subscriber: &newsletter_subscriber::Model) -> EmailMessage {
    let hello = match subscriber.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("Dear {},", name),
        _ => "Hello,".to_string(),
    };
    EmailMessage::new(
        &subscriber.email,
        "Welcome to the SocietyHub newsletter",
        format!(
            "{}\n\nYou are now subscribed to our newsletter.\n\
             To unsubscribe at any time, use this token: {}{}",
            hello, subscriber.token, SIGNATURE
        ),
    )
}

pub fn contact_received(inbox: &str, message: &contact_message::Model) -> EmailMessage {
    EmailMessage::new(
        inbox,
        format!("[Contact] {}", message.subject),
        format!(
            "New contact message #{} from {} <{}>:\n\n{}",
            message.id, message.name, message.email, message.message
        ),
    )
}

pub fn contact_acknowledgement(message: &contact_message::Model) -> EmailMessage {
    EmailMessage::new(
        &message.email,
        format!("We received your message: {}", message.subject),
        format!(
            "Dear {},\n\nThank you for contacting us. We will get back to you shortly.{}",
            message.name.trim(),
            SIGNATURE
        ),
    )
}
