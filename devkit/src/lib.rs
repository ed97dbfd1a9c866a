/*!
# GameSec DevKit - Stubs et utilitaires de test pour le moniteur

Bibliothèque facilitant le développement et les tests de `gamesec-monitor`:
- `MockMonitorApi` : API scriptée, sans serveur, avec journal des requêtes
- `PayloadBuilder` : payloads JSON conformes aux endpoints du serveur
- `StubServer` : serveur axum reproduisant les endpoints réels (tests HTTP, démo hors-ligne)
- `TestHarness` : scheduler piloté par le mock + attentes sur l'état
*/

pub mod mock_api;
pub mod payloads;
pub mod stub_server;
pub mod test_utils;

pub use mock_api::{Endpoint, MockFailure, MockMonitorApi};
pub use payloads::PayloadBuilder;
pub use stub_server::StubServer;
pub use test_utils::TestHarness;
