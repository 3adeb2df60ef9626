//! Views shipped with the shell.

mod console;
mod location;
mod modules;
mod registers;

pub use console::ConsoleView;
pub use location::LocationView;
pub use modules::ModulesView;
pub use registers::RegistersView;

use crate::registry::ViewRegistration;

/// Registration table for the built-in view types, in menu order.
pub fn builtin_views() -> Vec<ViewRegistration> {
    vec![
        ViewRegistration::of::<RegistersView>("registers").auto_start(),
        ViewRegistration::of::<ConsoleView>("console").auto_start(),
        ViewRegistration::of::<ModulesView>("modules"),
        ViewRegistration::of::<LocationView>("location").labeled("Stop History"),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use kdshell_symbols::{DwarfSymbolProvider, SymbolContext};
    use kdshell_target::ConnectionState;
    use tokio::sync::{mpsc, watch};

    use crate::capability::{ConnectionHandle, Services, ShellHandle, SymbolsHandle, ViewRequest};

    pub struct Harness {
        pub state: watch::Sender<ConnectionState>,
        pub requests: mpsc::UnboundedReceiver<ViewRequest>,
        pub symbols: Rc<RefCell<SymbolContext>>,
        pub services: Services,
    }

    pub fn harness() -> Harness {
        let (state, state_rx) = watch::channel(ConnectionState::default());
        let (req_tx, requests) = mpsc::unbounded_channel();
        let root = std::env::temp_dir();
        let symbols = Rc::new(RefCell::new(SymbolContext::new(
            Box::new(DwarfSymbolProvider::new(&root)),
            &root,
        )));
        let services = Services {
            connection: ConnectionHandle::new(state_rx, req_tx.clone()),
            symbols: SymbolsHandle::new(Rc::clone(&symbols)),
            shell: ShellHandle::new(req_tx),
        };
        Harness {
            state,
            requests,
            symbols,
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ViewRegistry;

    #[test]
    fn builtin_table_discovers_all() {
        let registry = ViewRegistry::discover(builtin_views(), &[]);
        assert_eq!(registry.descriptors().len(), 4);
        assert_eq!(registry.auto_start_ids(), vec!["registers", "console"]);

        let location = registry.find("location").unwrap();
        assert_eq!(location.display_name, "Stop History");
        let caps = location.capabilities;
        assert!(caps.connection && caps.symbols && caps.shell);

        let console = registry.find("console").unwrap().capabilities;
        assert!(console.connection && !console.symbols && !console.shell);
    }

    #[test]
    fn every_builtin_instantiates() {
        let h = testing::harness();
        let registry = ViewRegistry::discover(builtin_views(), &[]);
        for descriptor in registry.descriptors() {
            let hosted = registry.instantiate(descriptor.type_id, &h.services).unwrap();
            assert_eq!(hosted.type_id(), descriptor.type_id);
        }
    }
}
