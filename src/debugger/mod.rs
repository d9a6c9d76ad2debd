//! Contrat du débogueur attachable
//!
//! Le cœur ne connaît du débogueur que sa surface de contrôle : il l'attache
//! au début de la session, l'interroge à chaque tour de boucle avant toute
//! autre commande, et le détache à la fin. Le débogueur fournit son propre
//! réceptacle de journalisation, installé pendant toute la session attachée.

use crate::logging::LogSink;

/// Surface de contrôle du débogueur vue du cœur d'exécution
pub trait Debugger {
    /// Prend le contrôle de la machine au début de la session
    fn attach(&mut self);

    /// Rend le contrôle à la fin de la session
    fn detach(&mut self);

    /// Laisse le débogueur traiter ses propres événements
    ///
    /// Appelé à chaque tour de boucle, avant les commandes d'interface : le
    /// débogueur a un droit de préemption exclusif sur le tour.
    fn poll(&mut self);

    /// Vrai si le débogueur demande l'arrêt de la session ; consommé
    fn check_exit(&mut self) -> bool;

    /// Vrai si le débogueur demande la mise en pause ; consommé
    fn check_pause(&mut self) -> bool;

    /// Interrompt l'exécution au prochain point sûr
    fn force_break(&mut self, user_initiated: bool);

    /// Notifié quand la machine est réinitialisée ou rechargée
    fn reset(&mut self);

    /// Réceptacle de journalisation à installer pendant l'attachement
    fn log_sink(&self) -> Box<dyn LogSink>;
}
