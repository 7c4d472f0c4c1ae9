pub mod boundary;
pub mod command;
pub mod command_bus;
pub mod command_handler;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod dto;
pub mod error;
pub mod error_builder;
pub mod fault;
pub mod inmemory_command_bus;
pub mod inmemory_query_bus;
pub mod query;
pub mod query_bus;
pub mod query_handler;
pub mod registry;
pub mod unit_of_work;

pub use boundary::ServiceBoundary;
pub use command::{Command, DynCommand};
pub use command_bus::CommandBus;
pub use command_handler::{CommandHandler, CommandHandlerWithResult};
pub use config::BusConfig;
pub use context::AppContext;
pub use descriptor::HandlerDescriptor;
pub use error::{AppError, ErrorKind};
pub use fault::{FaultDetails, FaultException, FaultExceptionBuilder, FaultType};
pub use inmemory_command_bus::InMemoryCommandBus;
pub use inmemory_query_bus::InMemoryQueryBus;
pub use query::Query;
pub use query_bus::QueryBus;
pub use query_handler::QueryHandler;
pub use registry::HandlerRegistry;
pub use unit_of_work::{InMemoryTransactionManager, ScopeOption, UnitOfWork};
