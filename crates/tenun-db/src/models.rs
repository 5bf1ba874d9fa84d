use chrono::NaiveDate;

// Row types as stored in SQLite. The API crate maps them onto tenun-types
// response models.

pub struct UserRow {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

pub struct CharacterRow {
    pub character_id: String,
    pub name: String,
    pub bio: Option<String>,
    pub region: Option<String>,
}

pub struct ConversationRow {
    pub conversation_id: i64,
    pub user_id: String,
    pub character_id: String,
}

pub struct ConversationSummaryRow {
    pub conversation_id: i64,
    pub character_id: String,
    pub character_name: String,
    pub last_message: Option<String>,
    pub last_timestamp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub message_id: i64,
    pub conversation_id: i64,
    pub sender: String,
    pub message: String,
    pub timestamp: String,
}

pub struct WeaverRow {
    pub weaver_id: String,
    pub name: String,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub specialization: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub price: i64,
    pub category: String,
    pub description: Option<String>,
    pub meaning_motif: Option<String>,
    pub long_description: Option<String>,
    pub long_meaning_motif: Option<String>,
    pub video_url: Option<String>,
    pub photo_url: Option<String>,
    pub weaver_id: String,
}

/// A transaction joined with the name and current price of its product.
#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub transaction_id: String,
    pub user_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_price: i64,
    pub quantity: i64,
    pub address: String,
    pub phone_number: String,
    pub resi: Option<String>,
    pub total_price: i64,
    pub status: String,
    pub transaction_date: NaiveDate,
}

pub struct NewTransaction<'a> {
    pub transaction_id: &'a str,
    pub user_id: &'a str,
    pub product_id: &'a str,
    pub quantity: i64,
    pub address: &'a str,
    pub phone_number: &'a str,
    pub total_price: i64,
    pub transaction_date: NaiveDate,
}

/// One chat turn: the user's line and the reply generated for it.
pub struct NewExchange<'a> {
    pub user_id: &'a str,
    pub character_id: &'a str,
    pub user_text: &'a str,
    pub bot_text: &'a str,
    pub request_id: Option<&'a str>,
}
