//! Reply texts sent back to staff over chat.

use crate::chatbot::catalog::Catalog;
use crate::chatbot::record::{ClientField, ClientRecord};

/// Clients shown in one list reply.
pub const LIST_LIMIT: usize = 15;

pub const ADD_NAME_PROMPT: &str =
    "✨ *AGREGAR CLIENTA NUEVA*\n\n¿Cuál es el nombre completo de la clienta?\n\n_Escribe MENU para cancelar_";
pub const ADD_NAME_EMPTY: &str = "⚠️ El nombre no puede estar vacío.\n\n¿Cuál es el nombre completo de la clienta?";
pub const INVALID_PHONE: &str =
    "⚠️ Número inválido. Debe iniciar con *+* seguido del código de país.\n\nEjemplo: +573001234567\n\nInténtalo de nuevo:";
pub const LAST_DATE_PROMPT: &str =
    "¿Cuándo fue su último tratamiento?\n\nFormato: *AAAA-MM-DD*\nEjemplo: 2024-10-15\n\n_O escribe SALTAR para usar la fecha de hoy_";
pub const INVALID_LAST_DATE: &str =
    "⚠️ Fecha inválida. Usa formato *AAAA-MM-DD*\n\nEjemplo: 2024-10-15\n\nInténtalo de nuevo:";
pub const NEXT_DATE_PROMPT: &str =
    "¿Cuándo quieres enviar el recordatorio?\n\nFormato: *AAAA-MM-DD*\nEjemplo: 2025-01-15\n\n_O escribe SALTAR para dejarlo automático_";
pub const INVALID_NEXT_DATE: &str =
    "⚠️ Fecha inválida. Usa formato *AAAA-MM-DD*\n\nEjemplo: 2025-01-15\n\nInténtalo de nuevo:";
pub const VIEW_PROMPT: &str =
    "🔍 *VER DETALLES*\n\nEscribe el ID de la clienta que quieres consultar.\n\n_Primero usa opción 2 para ver los IDs_";
pub const UPDATE_PROMPT: &str =
    "✏️ *ACTUALIZAR INFORMACIÓN*\n\nEscribe el ID de la clienta que quieres actualizar.\n\n_Usa opción 2 para ver los IDs_";
pub const UPDATE_ID_NOT_NUMBER: &str = "⚠️ Debes escribir el ID (número).\n\nInténtalo de nuevo:";
pub const UPDATE_FIELD_INVALID: &str = "⚠️ Opción inválida. Escribe un número del 1 al 5:";
pub const UPDATE_INVALID_PHONE: &str = "⚠️ Teléfono inválido. Formato: +573001234567\n\nInténtalo de nuevo:";
pub const UPDATE_INVALID_DATE: &str = "⚠️ Fecha inválida. Formato: AAAA-MM-DD\n\nInténtalo de nuevo:";
pub const REMINDERS_RUN: &str = "✅ Recordatorios ejecutados.";
pub const INTERNAL_ERROR: &str = "⚠️ Error interno. Escribe MENU para reiniciar.";
pub const BAD_REQUEST: &str = "Error leyendo el mensaje.";

pub fn menu() -> String {
    "👸 *MENÚ PRINCIPAL*\n\n\
     Escribe el número de la opción:\n\n\
     1️⃣ Agregar clienta nueva\n\
     2️⃣ Ver lista de clientas\n\
     3️⃣ Ver detalles de una clienta\n\
     4️⃣ Actualizar información\n\
     5️⃣ Ejecutar recordatorios ahora\n\
     6️⃣ Ayuda\n\n\
     💡 _Escribe el número para continuar_"
        .to_string()
}

pub fn help() -> String {
    "📚 *AYUDA DEL SISTEMA*\n\n\
     Este bot te ayuda a gestionar tus clientas y enviar recordatorios automáticos.\n\n\
     *Opciones disponibles:*\n\n\
     1️⃣ *Agregar clienta:* Te guiaré paso a paso para registrar una nueva clienta\n\n\
     2️⃣ *Ver lista:* Muestra todas tus clientas registradas\n\n\
     3️⃣ *Ver detalles:* Consulta información completa de una clienta\n\n\
     4️⃣ *Actualizar:* Modifica datos de una clienta existente\n\n\
     5️⃣ *Recordatorios:* Envía los recordatorios programados ahora mismo\n\n\
     _Escribe MENU en cualquier momento para volver al inicio_ ✨"
        .to_string()
}

pub fn treatments(catalog: &Catalog) -> String {
    let mut text = String::from("💆‍♀️ *TRATAMIENTOS DISPONIBLES*\n\n");
    for (i, t) in catalog.iter().enumerate() {
        text.push_str(&format!(
            "{}. {}\n   Duración: {} meses\n   {}\n\n",
            i + 1,
            t.name,
            t.duration_months,
            t.price
        ));
    }
    text.push_str("_Escribe el número del tratamiento_");
    text
}

pub fn invalid_treatment(catalog: &Catalog) -> String {
    format!("⚠️ Opción inválida. {}", treatments(catalog))
}

pub fn phone_prompt(name: &str) -> String {
    format!("Perfecto, *{name}* ✨\n\n¿Cuál es su número de teléfono?\n\n_Formato: +573001234567_")
}

pub fn client_list(clients: &[ClientRecord]) -> String {
    if clients.is_empty() {
        return format!("📋 No hay clientas registradas aún.\n\n{}", menu());
    }

    let mut text = format!("📋 *TUS CLIENTAS* (Total: {})\n\n", clients.len());
    for c in clients.iter().take(LIST_LIMIT) {
        let next = c.next_reminder.map(|d| d.to_string()).unwrap_or_else(|| "—".to_string());
        text.push_str(&format!(
            "*{}* - {}\n   📱 {}\n   📅 Próximo: {}\n\n",
            c.id,
            c.display_name(),
            c.phone.as_deref().unwrap_or("—"),
            next
        ));
    }
    if clients.len() > LIST_LIMIT {
        text.push_str(&format!("_...y {} más_\n\n", clients.len() - LIST_LIMIT));
    }
    text.push_str("💡 _Escribe el ID para ver detalles_");
    text
}

pub fn client_detail(client: &ClientRecord, catalog: &Catalog) -> String {
    let treatment = client
        .treatment_type
        .as_deref()
        .and_then(|k| catalog.get(k))
        .map(|t| t.name.as_str())
        .unwrap_or("No especificado");

    let mut text = format!("👤 *{}* (ID: {})\n\n", client.display_name(), client.id);
    text.push_str(&format!("📱 Teléfono: {}\n", client.phone.as_deref().unwrap_or("—")));
    text.push_str(&format!("💆‍♀️ Tratamiento: {treatment}\n"));
    text.push_str(&format!(
        "📅 Último tratamiento: {}\n",
        client.last_treatment_date.map(|d| d.to_string()).unwrap_or_else(|| "—".to_string())
    ));
    text.push_str(&format!(
        "🔔 Próximo recordatorio: {}\n",
        client.next_reminder.map(|d| d.to_string()).unwrap_or_else(|| "Automático".to_string())
    ));
    if let Some(sent) = client.last_reminder_sent {
        text.push_str(&format!("✅ Último envío: {sent}\n"));
    }
    if let Some(ref hair) = client.hair_type {
        text.push_str(&format!("💇 Cabello: {hair}\n"));
    }
    if let Some(ref notes) = client.notes {
        text.push_str(&format!("📝 Notas: {notes}\n"));
    }
    text.push_str("\n💡 _Usa opción 4 del menú para actualizar_");
    text
}

pub fn client_not_found(id: u32) -> String {
    format!("⚠️ No existe clienta con ID {id}\n\n{}", menu())
}

pub fn update_id_unknown(id: u32) -> String {
    format!("⚠️ No existe clienta con ID {id}.\n\nInténtalo de nuevo o escribe MENU:")
}

pub fn client_created(client: &ClientRecord, catalog: &Catalog) -> String {
    let treatment = client
        .treatment_type
        .as_deref()
        .and_then(|k| catalog.get(k))
        .map(|t| t.name.as_str())
        .unwrap_or("—");
    format!(
        "✅ *Clienta agregada exitosamente*\n\n👤 {}\n📱 {}\n💆‍♀️ {}\nID: {}\n\n{}",
        client.display_name(),
        client.phone.as_deref().unwrap_or("—"),
        treatment,
        client.id,
        menu()
    )
}

pub fn field_menu(client: &ClientRecord) -> String {
    format!(
        "Actualizando: *{}*\n\n¿Qué campo quieres actualizar?\n\n\
         1️⃣ Nombre\n2️⃣ Teléfono\n3️⃣ Tipo de tratamiento\n4️⃣ Último tratamiento\n5️⃣ Próximo recordatorio\n\n\
         _Escribe el número_",
        client.display_name()
    )
}

pub fn value_prompt(field: ClientField, catalog: &Catalog) -> String {
    match field {
        ClientField::Treatment => treatments(catalog),
        f if f.is_date() => format!(
            "Nuevo valor para *{}*:\n\nFormato: *AAAA-MM-DD*\nEjemplo: 2024-10-15\n\n_O escribe NINGUNO para borrar_",
            f.key()
        ),
        f => format!("Nuevo valor para *{}*:\n\n_O escribe NINGUNO para borrar_", f.key()),
    }
}

pub fn field_updated(field: ClientField, name: &str) -> String {
    format!("✅ Campo *{}* actualizado para {name}\n\n{}", field.key(), menu())
}

pub fn reminders_run(sent: usize) -> String {
    format!("{REMINDERS_RUN} Mensajes enviados: {sent}")
}
