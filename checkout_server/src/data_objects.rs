use checkout_engine::db_types::{MicroUsdc, NewOrder, OrderConversionError, OrderItem};
use serde::{Deserialize, Serialize};

const PRODUCT_IMAGE_URL: &str = "https://images.pexels.com/photos/546819/pexels-photo-546819.jpeg";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_usdc: f64,
    pub image_url: &'static str,
}

const fn product(id: &'static str, name: &'static str, description: &'static str, price_usdc: f64) -> Product {
    Product { id, name, description, price_usdc, image_url: PRODUCT_IMAGE_URL }
}

/// The storefront catalogue. It is fixed; prices are in USDC.
pub const PRODUCTS: [Product; 12] = [
    product("starter-kit", "Starter Kit", "Lightweight entry plan for small experiments.", 1.0),
    product("growth-bundle", "Growth Bundle", "Everything you need to scale your next launch.", 12.0),
    product("pro-suite", "Pro Suite", "Advanced toolkit for high-volume merchants.", 20.0),
    product("studio-templates", "Studio Templates", "Pre-built canvases for rapid ideation.", 7.0),
    product("team-collab", "Team Collaboration", "Unlocks real-time team sessions.", 9.0),
    product("insights-pack", "Insights Pack", "Analytics overlay for every session.", 11.0),
    product("webinar-pass", "Webinar Pass", "Access to a live workshop series.", 4.0),
    product("design-library", "Design Library", "Hand-crafted components and stickers.", 6.5),
    product("ops-playbook", "Ops Playbook", "Operational templates for recurring rituals.", 8.0),
    product("research-deck", "Research Deck", "User interview and discovery toolkit.", 10.0),
    product("retro-kit", "Retro Kit", "Facilitation assets for sprint retros.", 3.5),
    product("strategy-board", "Strategy Board", "Long-range planning frameworks bundle.", 14.0),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl TryFrom<CreateOrderRequest> for NewOrder {
    type Error = OrderConversionError;

    fn try_from(value: CreateOrderRequest) -> Result<Self, Self::Error> {
        NewOrder::new(value.customer_name, value.customer_email, value.items)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount_usdc: MicroUsdc,
    pub deposit_address: String,
    pub network: String,
}
