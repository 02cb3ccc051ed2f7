//! # Configuración del Servidor
//! src/config.rs
//!
//! Este módulo define la configuración del servidor con soporte para
//! argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./concurrent_server -d ./www -p 10000 -t 8 -b 16 -s 1
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! SERVER_PORT=8080 SERVER_THREADS=4 ./concurrent_server
//! ```

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::queue::SchedPolicy;

/// Configuración del servidor concurrente
#[derive(Debug, Clone, Parser)]
#[command(name = "concurrent_server")]
#[command(about = "Servidor concurrente con pool de workers y cola acotada de conexiones")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Directorio raíz desde el que corre el servidor
    #[arg(short = 'd', long = "dir", default_value = ".", env = "SERVER_ROOT")]
    pub root_dir: PathBuf,

    /// Puerto TCP en el que escucha el servidor
    #[arg(short, long, default_value = "10000", env = "SERVER_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "SERVER_HOST")]
    pub host: String,

    // === Workers y cola ===

    /// Número de threads worker
    #[arg(short = 't', long = "threads", default_value = "1", env = "SERVER_THREADS")]
    pub threads: usize,

    /// Capacidad de la cola de conexiones (buffers)
    #[arg(short = 'b', long = "buffers", default_value = "1", env = "SERVER_BUFFERS")]
    pub buffers: usize,

    /// Algoritmo de planificación: 1|fifo (FIFO) o 0|sff (shortest first)
    #[arg(short = 's', long = "schedalg", default_value = "1", env = "SERVER_SCHEDALG")]
    pub policy: SchedPolicy,

    // === Logging ===

    /// Nivel de log (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "info", env = "SERVER_LOG_LEVEL")]
    pub log_level: LevelFilter,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI.
    ///
    /// Con flags malformados clap imprime el uso en stderr y termina con
    /// estado distinto de cero.
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use concurrent_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:10000");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads(self.threads));
        }
        if self.buffers == 0 {
            return Err(ConfigError::InvalidBuffers(self.buffers));
        }

        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║            Concurrent Server Configuration                   ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:      {}", self.address());
        println!("   Root dir:     {}", self.root_dir.display());
        println!();
        println!("👷 Worker Pool & Queue:");
        println!("   Threads:      {}", self.threads);
        println!("   Buffers:      {}", self.buffers);
        println!("   Scheduling:   {}", self.policy);
        println!();
        println!("📝 Log level:    {}", self.log_level);
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto (igual a la del CLI sin flags)
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            port: 10000,
            host: "0.0.0.0".to_string(),
            threads: 1,
            buffers: 1,
            policy: SchedPolicy::Fifo,
            log_level: LevelFilter::Info,
        }
    }
}
