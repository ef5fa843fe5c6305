//! Interactive administration console.
//!
//! Line-based menu for the salon owner: start the automatic timer, run a
//! reminder pass, list, add and update clients. Reads from any async line
//! source so sessions can be scripted.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use cron::Schedule;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::info;

use crate::chatbot::catalog::{Catalog, Treatment};
use crate::chatbot::record::{FieldValue, NewClient};
use crate::chatbot::reminders::{ReminderEngine, today_in};
use crate::chatbot::scheduler::Scheduler;
use crate::chatbot::store::SharedStore;
use crate::chatbot::validate::{is_valid_phone, parse_date};

const BANNER: &str = "
╔═══════════════════════════════════════════════╗
║          SISTEMA DE RECORDATORIOS - ESTILISTA 👸
╚═══════════════════════════════════════════════╝
--- Automatización ---
1. Iniciar sistema automático (24/7)
2. Enviar recordatorios AHORA

--- Gestión de Clientes ---
3. Ver lista de clientas
4. Añadir nueva clienta
5. Actualizar tratamiento / recordatorio

--- Otros ---
6. Salir
";

const INVALID_DATE: &str = "⚠️ Formato inválido. Usa AAAA-MM-DD (ej: 2025-12-10) o deja vacío.";
const INVALID_PHONE: &str =
    "⚠️ Formato inválido. Debe empezar con '+' seguido del código de país y número (ej: +573001234567).";
const INVALID_OPTION: &str = "⚠️ Opción inválida.";

/// Timer settings for the automatic mode.
#[derive(Clone)]
pub struct AutoMode {
    pub schedule: Schedule,
    pub poll: Duration,
}

pub struct Console<R, W> {
    input: Lines<R>,
    out: W,
    store: SharedStore,
    catalog: Arc<Catalog>,
    reminders: Arc<ReminderEngine>,
    auto: AutoMode,
    tz: Tz,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        input: R,
        out: W,
        store: SharedStore,
        catalog: Arc<Catalog>,
        reminders: Arc<ReminderEngine>,
        auto: AutoMode,
        tz: Tz,
    ) -> Self {
        Self { input: input.lines(), out, store, catalog, reminders, auto, tz }
    }

    /// Run the menu until option 6 or end of input.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.out, "\n{BANNER}")?;
            let Some(choice) = self.ask("Selecciona una opción (1-6): ").await? else {
                return Ok(());
            };
            match choice.as_str() {
                "1" => self.automatic().await?,
                "2" => {
                    let sent = self.reminders.run_check().await;
                    writeln!(self.out, "\n✅ Verificación finalizada. Total mensajes enviados: {sent}")?;
                }
                "3" => self.list().await?,
                "4" => self.add_client().await?,
                "5" => self.update_client().await?,
                "6" => {
                    writeln!(self.out, "¡Hasta pronto! Gracias por usar el Asistente de Estilista. 💕")?;
                    return Ok(());
                }
                _ => writeln!(self.out, "⚠️ Opción no válida. Selecciona un número entre 1 y 6.")?,
            }
        }
    }

    /// Print a prompt and read one trimmed line. `None` at end of input.
    async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        Ok(self.input.next_line().await?.map(|line| line.trim().to_string()))
    }

    /// Ask for a date until one parses. Empty input gives `Some(None)`.
    async fn ask_date(&mut self, prompt: &str) -> io::Result<Option<Option<NaiveDate>>> {
        loop {
            let Some(line) = self.ask(prompt).await? else {
                return Ok(None);
            };
            if line.is_empty() {
                return Ok(Some(None));
            }
            match parse_date(&line) {
                Some(date) => return Ok(Some(Some(date))),
                None => writeln!(self.out, "{INVALID_DATE}")?,
            }
        }
    }

    /// Ask for a catalog entry by number. Empty input gives `Some(None)`
    /// when `allow_empty` is set.
    async fn ask_treatment(&mut self, prompt: &str, allow_empty: bool) -> io::Result<Option<Option<Treatment>>> {
        for (i, t) in self.catalog.iter().enumerate() {
            writeln!(self.out, "  {}. {} ({} meses)", i + 1, t.name, t.duration_months)?;
        }
        loop {
            let Some(line) = self.ask(prompt).await? else {
                return Ok(None);
            };
            if line.is_empty() && allow_empty {
                return Ok(Some(None));
            }
            match self.catalog.by_choice(&line) {
                Some(t) => return Ok(Some(Some(t.clone()))),
                None => writeln!(self.out, "{INVALID_OPTION}")?,
            }
        }
    }

    async fn automatic(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n💇‍♀️ Sistema de Recordatorios - Iniciado")?;
        writeln!(self.out, "✓ Ejecutando verificación inicial ahora...")?;
        writeln!(self.out, "\nPresiona Ctrl+C para detener el sistema automático y volver al menú.\n")?;

        let reminders = self.reminders.clone();
        let scheduler = Scheduler::start(self.auto.schedule.clone(), self.tz, self.auto.poll, move || {
            let reminders = reminders.clone();
            async move {
                reminders.run_check().await;
            }
        });

        tokio::signal::ctrl_c().await?;
        scheduler.stop();
        info!("Automatic mode stopped from console");
        writeln!(self.out, "\n🛑 Sistema automático detenido por el usuario. Volviendo al menú.")?;
        Ok(())
    }

    async fn list(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n--- 📋 LISTA DE CLIENTAS ---")?;
        let store = self.store.lock().await;
        if store.is_empty() {
            writeln!(self.out, "Aún no hay clientas registradas.")?;
            return Ok(());
        }

        let header = format!(
            "{:>2}  {:<22}  {:<15}  {:<10}  {:<12}  {:<18}",
            "ID", "Nombre", "Teléfono", "Último", "Próx. Record.", "Tratamiento"
        );
        writeln!(self.out, "{header}")?;
        writeln!(self.out, "{}", "-".repeat(header.chars().count()))?;

        for c in store.clients() {
            let treatment = c
                .treatment_type
                .as_deref()
                .and_then(|k| self.catalog.get(k))
                .map(|t| t.name.as_str())
                .unwrap_or("Desconocido");
            writeln!(
                self.out,
                "{:>2}  {:<22}  {:<15}  {:<10}  {:<12}  {:<18}",
                c.id,
                truncate(c.name.as_deref().unwrap_or(""), 22),
                truncate(c.phone.as_deref().unwrap_or(""), 15),
                c.last_treatment_date.map(|d| d.to_string()).unwrap_or_default(),
                c.next_reminder.map(|d| d.to_string()).unwrap_or_else(|| "—".to_string()),
                truncate(treatment, 18),
            )?;
        }
        Ok(())
    }

    async fn add_client(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n--- ➕ AGREGAR NUEVA CLIENTA ---")?;

        let name = loop {
            let Some(name) = self.ask("Nombre completo: ").await? else {
                return Ok(());
            };
            if !name.is_empty() {
                break name;
            }
            writeln!(self.out, "⚠️ El nombre no puede estar vacío.")?;
        };

        let phone = loop {
            let Some(phone) = self.ask("Teléfono (Ej: +573001234567): ").await? else {
                return Ok(());
            };
            if is_valid_phone(&phone) {
                break phone;
            }
            writeln!(self.out, "{INVALID_PHONE}")?;
        };

        writeln!(self.out, "\nTratamientos disponibles:")?;
        let prompt = format!("Selecciona tratamiento (1-{}): ", self.catalog.len());
        let Some(Some(treatment)) = self.ask_treatment(&prompt, false).await? else {
            return Ok(());
        };

        let Some(last) = self
            .ask_date("Fecha del último tratamiento (AAAA-MM-DD) o deja vacío para hoy: ")
            .await?
        else {
            return Ok(());
        };

        let Some(hair_type) = self
            .ask("Tipo de cabello (liso/ondulado/rizado/muy_rizado) (opcional): ")
            .await?
        else {
            return Ok(());
        };
        let Some(notes) = self.ask("Notas (opcional): ").await? else {
            return Ok(());
        };

        writeln!(self.out, "\nPuedes definir una fecha manual para el próximo recordatorio (opcional).")?;
        writeln!(
            self.out,
            "Si la dejas vacía, el sistema usará un cálculo automático según el tratamiento (respaldo)."
        )?;
        let Some(next_reminder) = self.ask_date("Próximo recordatorio (AAAA-MM-DD) o ENTER: ").await? else {
            return Ok(());
        };

        let record = self.store.lock().await.add(NewClient {
            name,
            phone,
            treatment_type: treatment.key,
            last_treatment_date: last.unwrap_or_else(|| today_in(self.tz)),
            hair_type: non_empty(hair_type),
            notes: non_empty(notes),
            next_reminder,
        });
        writeln!(self.out, "\n✅ Clienta '{}' agregada (ID: {}).", record.display_name(), record.id)?;
        Ok(())
    }

    async fn update_client(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n--- ✍️ ACTUALIZAR TRATAMIENTO / RECORDATORIO ---")?;
        self.list().await?;
        if self.store.lock().await.is_empty() {
            return Ok(());
        }

        let (id, name, current) = loop {
            let Some(line) = self.ask("Ingresa ID de la clienta a actualizar (0 para cancelar): ").await? else {
                return Ok(());
            };
            let Ok(id) = line.parse::<u32>() else {
                writeln!(self.out, "⚠️ Debes ingresar un número.")?;
                continue;
            };
            if id == 0 {
                return Ok(());
            }
            let store = self.store.lock().await;
            match store.find_by_id(id) {
                Some(c) => break (id, c.display_name().to_string(), c.treatment_type.clone()),
                None => writeln!(self.out, "⚠️ ID no encontrado.")?,
            }
        };

        writeln!(self.out, "\nActualizando -> {name} (ID {id})")?;
        writeln!(self.out, "\nTratamientos:")?;
        let prompt = format!(
            "Selecciona tratamiento (1-{}) o ENTER para mantener ({}): ",
            self.catalog.len(),
            current.as_deref().unwrap_or("—")
        );
        let Some(treatment) = self.ask_treatment(&prompt, true).await? else {
            return Ok(());
        };

        let Some(last) = self
            .ask_date("Nueva fecha de último tratamiento (AAAA-MM-DD) o ENTER para hoy: ")
            .await?
        else {
            return Ok(());
        };

        writeln!(
            self.out,
            "\nEstablece la fecha del próximo recordatorio (manual) o deja vacío para usar cálculo automático:"
        )?;
        let Some(next_reminder) = self.ask_date("Próximo recordatorio (AAAA-MM-DD) o ENTER: ").await? else {
            return Ok(());
        };

        let mut changes = vec![
            FieldValue::LastTreatment(Some(last.unwrap_or_else(|| today_in(self.tz)))),
            FieldValue::NextReminder(next_reminder),
        ];
        if let Some(t) = treatment {
            changes.insert(0, FieldValue::Treatment(Some(t.key)));
        }

        let mut store = self.store.lock().await;
        for change in changes {
            store.update_field(id, change);
        }
        writeln!(self.out, "\n✅ Datos actualizados para {name} (ID {id}).")?;
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
