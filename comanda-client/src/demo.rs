//! Demo data seeding for trial accounts
//!
//! A freshly signed-up demo-plan account gets a starter menu so the
//! dashboard and guest view have something to show. Real plans and
//! accounts that already built a menu are never touched.

use shared::models::MenuItemCreate;
use uuid::Uuid;

use crate::error::ClientResult;
use crate::store::HttpStore;

/// (name, price, category, description, featured)
const STARTER_MENU: &[(&str, f64, &str, &str, bool)] = &[
    // Entradas
    (
        "Bruschetta Caprese",
        28.00,
        "Entradas",
        "Pão italiano, tomate, mussarela de búfala e manjericão",
        false,
    ),
    (
        "Carpaccio de Salmão",
        42.00,
        "Entradas",
        "Salmão fresco, alcaparras, limão siciliano e azeite",
        false,
    ),
    (
        "Tábua de Queijos",
        38.00,
        "Entradas",
        "Seleção de queijos artesanais com geleia",
        false,
    ),
    // Principais
    (
        "Risoto de Camarão",
        78.00,
        "Principais",
        "Arroz arbóreo, camarões grandes, alho-poró e parmesão",
        true,
    ),
    (
        "Filé ao Molho Madeira",
        89.00,
        "Principais",
        "Filé mignon grelhado, molho madeira e batatas rústicas",
        false,
    ),
    (
        "Salmão Grelhado",
        72.00,
        "Principais",
        "Salmão fresco, purê de batata-doce e legumes",
        false,
    ),
    (
        "Massa à Carbonara",
        56.00,
        "Principais",
        "Massa fresca, bacon, ovos, parmesão e pimenta",
        false,
    ),
    // Bebidas
    (
        "Limonada Suíça",
        18.00,
        "Bebidas",
        "Limão, açúcar, leite condensado e gelo",
        false,
    ),
    (
        "Suco Natural",
        14.00,
        "Bebidas",
        "Laranja, morango ou abacaxi",
        false,
    ),
    ("Refrigerante", 8.00, "Bebidas", "Lata 350ml", false),
    ("Água Mineral", 6.00, "Bebidas", "Com ou sem gás 500ml", false),
    // Sobremesas
    (
        "Petit Gâteau",
        32.00,
        "Sobremesas",
        "Bolo de chocolate com sorvete de creme",
        true,
    ),
    (
        "Cheesecake",
        28.00,
        "Sobremesas",
        "Tradicional com calda de frutas vermelhas",
        false,
    ),
    (
        "Tiramisù",
        30.00,
        "Sobremesas",
        "Sobremesa italiana clássica com café",
        false,
    ),
];

/// Seed the starter menu for a demo account
///
/// No-op when the account already has menu items or is not on the demo
/// plan. Returns the number of items created.
pub async fn seed_demo_menu(store: &HttpStore, account_id: Uuid) -> ClientResult<usize> {
    let existing = store.fetch_menu_items(account_id).await?;
    if !existing.is_empty() {
        return Ok(0);
    }

    let profile = store.fetch_profile(account_id).await?;
    if !profile.is_demo() {
        return Ok(0);
    }

    for &(name, price, category, description, featured) in STARTER_MENU {
        store
            .create_menu_item(
                account_id,
                MenuItemCreate {
                    name: name.to_string(),
                    description: description.to_string(),
                    price,
                    category: category.to_string(),
                    is_featured: Some(featured),
                    is_available: Some(true),
                    image_url: None,
                    ingredients: None,
                    preparation_time: None,
                },
            )
            .await?;
    }

    tracing::info!(account = %account_id, count = STARTER_MENU.len(), "Seeded demo menu");
    Ok(STARTER_MENU.len())
}
